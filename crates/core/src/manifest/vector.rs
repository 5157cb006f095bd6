//! Vector design page: a `_class`-tagged page JSON plus its images, zipped
//! into a single design file.
//!
//! The staged package looks like
//!
//! ```text
//! package/
//!   pages/<PAGE_ID>.json
//!   images/<content address>.png
//!   previews/preview.png
//!   ...template files
//! ```

use crate::error::RunResult;
use crate::sanitize::{content_address, qualified_name};
use host_engine::Archiver;
use layer_model::{CanvasSize, ExportConfig, ExportedLayerRecord, PixelRect, VectorOptions};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

pub const PAGE_ID: &str = "2FFDFB58-88DB-4181-AF9D-0992465502E8";
pub const PAGE_NAME: &str = "Page 1";

/// Namespace for the v5 identifiers of groups, bitmaps and styles.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f1e_54c2_3b7a_5d0e_9c4f_21a6_d3e8_7b10);

/// Layout-level node before serialization. Children are in record order.
#[derive(Debug, Clone, PartialEq)]
pub enum PageNode {
    Group { id: String, name: String, children: Vec<PageNode> },
    Bitmap { id: String, name: String, frame: PixelRect, image_ref: String },
}

impl PageNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Group { name, .. } | Self::Bitmap { name, .. } => name,
        }
    }
}

#[derive(Debug, Default)]
struct IdGenerator {
    seen: HashMap<String, u32>,
}

impl IdGenerator {
    /// Same key and occurrence give the same id across runs.
    fn next(&mut self, kind: &str, key: &str) -> String {
        let full = format!("{kind}:{key}");
        let ordinal = *self
            .seen
            .entry(full.clone())
            .and_modify(|count| *count += 1)
            .or_insert(0);
        upper_uuid(&format!("{full}#{ordinal}"))
    }
}

fn upper_uuid(name: &str) -> String {
    Uuid::new_v5(&ID_NAMESPACE, name.as_bytes())
        .hyphenated()
        .to_string()
        .to_uppercase()
}

/// Reference to an image inside the package, without extension.
pub fn image_ref(record: &ExportedLayerRecord) -> String {
    format!("images/{}", content_address(&qualified_name(&record.hierarchy, &record.name)))
}

/// Nests visible records into groups by hierarchy path.
///
/// Consecutive records sharing a group name at the same depth belong to one
/// group; a group name that reappears later starts a new group, as it
/// belongs to a different host group with the same name.
///
/// Grouping sees only sanitized hierarchy paths. Adjacent sibling groups
/// whose names sanitize alike ("Row 1" and "Row-1") merge into one group.
pub fn regroup(records: &[ExportedLayerRecord]) -> Vec<PageNode> {
    let visible: Vec<&ExportedLayerRecord> = records.iter().filter(|record| record.visible).collect();
    let mut ids = IdGenerator::default();
    regroup_level(&visible, 0, &mut ids)
}

fn regroup_level(records: &[&ExportedLayerRecord], depth: usize, ids: &mut IdGenerator) -> Vec<PageNode> {
    let mut nodes = Vec::new();
    let mut index = 0;

    while index < records.len() {
        let record = records[index];
        match record.hierarchy.get(depth) {
            None => {
                let qualified = qualified_name(&record.hierarchy, &record.name);
                nodes.push(PageNode::Bitmap {
                    id: ids.next("bitmap", &qualified),
                    name: record.raw_name.clone(),
                    frame: record.bounds,
                    image_ref: image_ref(record),
                });
                index += 1;
            }
            Some(segment) => {
                let run = records[index..]
                    .iter()
                    .take_while(|other| other.hierarchy.get(depth) == Some(segment))
                    .count();
                let path = record.hierarchy[..=depth].join("/");
                let id = ids.next("group", &path);
                let children = regroup_level(&records[index..index + run], depth + 1, ids);
                nodes.push(PageNode::Group { id, name: segment.clone(), children });
                index += run;
            }
        }
    }

    nodes
}

/// Reverses every child list so the top-most layer ends up last, as the
/// design tool stacks bottom to top.
pub fn reverse_layers(nodes: &mut [PageNode]) {
    nodes.reverse();
    for node in nodes {
        if let PageNode::Group { children, .. } = node {
            reverse_layers(children);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "_class", rename_all = "camelCase")]
pub enum PageLayer {
    Page(Container),
    Group(Container),
    Bitmap(Bitmap),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(rename = "do_objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub flags: LayerFlags,
    pub name: String,
    pub name_is_fixed: bool,
    pub frame: Frame,
    pub style: Value,
    pub has_click_through: bool,
    pub group_layout: Value,
    pub layers: Vec<PageLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_ruler_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_ruler_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bitmap {
    #[serde(rename = "do_objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub flags: LayerFlags,
    pub name: String,
    pub name_is_fixed: bool,
    pub frame: Frame,
    pub style: Value,
    pub clipping_mask: &'static str,
    pub fill_replaces_image: bool,
    pub image: ImageReference,
    #[serde(rename = "intendedDPI")]
    pub intended_dpi: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFlags {
    pub boolean_operation: i32,
    pub is_fixed_to_viewport: bool,
    pub is_flipped_horizontal: bool,
    pub is_flipped_vertical: bool,
    pub is_locked: bool,
    pub is_template: bool,
    pub is_visible: bool,
    pub layer_list_expanded_type: u8,
    pub resizing_constraint: u8,
    pub resizing_type: u8,
    pub rotation: i32,
    pub should_break_mask_chain: bool,
    pub export_options: Value,
    pub clipping_mask_mode: u8,
    pub has_clipping_mask: bool,
}

impl Default for LayerFlags {
    fn default() -> Self {
        Self {
            boolean_operation: -1,
            is_fixed_to_viewport: false,
            is_flipped_horizontal: false,
            is_flipped_vertical: false,
            is_locked: false,
            is_template: false,
            is_visible: true,
            layer_list_expanded_type: 1,
            resizing_constraint: 63,
            resizing_type: 0,
            rotation: 0,
            should_break_mask_chain: false,
            export_options: json!({
                "_class": "exportOptions",
                "includedLayerIds": [],
                "layerOptions": 0,
                "shouldTrim": false,
                "exportFormats": []
            }),
            clipping_mask_mode: 0,
            has_clipping_mask: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(rename = "_class")]
    pub class: &'static str,
    pub constrain_proportions: bool,
    pub height: i64,
    pub width: i64,
    pub x: i64,
    pub y: i64,
}

impl Frame {
    fn new(rect: PixelRect, constrain_proportions: bool) -> Self {
        Self {
            class: "rect",
            constrain_proportions,
            height: rect.height(),
            width: rect.width(),
            x: rect.left,
            y: rect.top,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    #[serde(rename = "_class")]
    pub class: &'static str,
    #[serde(rename = "_ref_class")]
    pub ref_class: &'static str,
    #[serde(rename = "_ref")]
    pub reference: String,
}

fn style(owner_id: &str) -> Value {
    json!({
        "_class": "style",
        "do_objectID": upper_uuid(&format!("style:{owner_id}")),
        "endMarkerType": 0,
        "miterLimit": 10,
        "startMarkerType": 0,
        "windingRule": 1,
        "blur": {
            "_class": "blur",
            "isEnabled": false,
            "center": "{0.5, 0.5}",
            "motionAngle": 0,
            "radius": 10,
            "saturation": 1,
            "type": 0
        },
        "borderOptions": {
            "_class": "borderOptions",
            "isEnabled": true,
            "dashPattern": [],
            "lineCapStyle": 0,
            "lineJoinStyle": 0
        },
        "borders": [],
        "colorControls": {
            "_class": "colorControls",
            "isEnabled": false,
            "brightness": 0,
            "contrast": 1,
            "hue": 0,
            "saturation": 1
        },
        "contextSettings": {
            "_class": "graphicsContextSettings",
            "blendMode": 0,
            "opacity": 1
        },
        "fills": [],
        "innerShadows": [],
        "shadows": []
    })
}

fn ruler() -> Value {
    json!({ "_class": "rulerData", "base": 0, "guides": [] })
}

fn group_layout() -> Value {
    json!({ "_class": "MSImmutableFreeformGroupLayout" })
}

fn to_layer(node: &PageNode, canvas: CanvasSize) -> PageLayer {
    match node {
        PageNode::Group { id, name, children } => PageLayer::Group(Container {
            object_id: id.clone(),
            flags: LayerFlags::default(),
            name: name.clone(),
            name_is_fixed: true,
            frame: Frame::new(canvas.to_rect(), false),
            style: style(id),
            has_click_through: false,
            group_layout: group_layout(),
            layers: children.iter().map(|child| to_layer(child, canvas)).collect(),
            horizontal_ruler_data: None,
            vertical_ruler_data: None,
        }),
        PageNode::Bitmap { id, name, frame, image_ref } => PageLayer::Bitmap(Bitmap {
            object_id: id.clone(),
            flags: LayerFlags::default(),
            name: name.clone(),
            name_is_fixed: false,
            frame: Frame::new(*frame, true),
            style: style(id),
            clipping_mask: "{{0, 0}, {1, 1}}",
            fill_replaces_image: false,
            image: ImageReference {
                class: "MSJSONFileReference",
                ref_class: "MSImageData",
                reference: image_ref.clone(),
            },
            intended_dpi: 72,
        }),
    }
}

/// Page document for nodes that are already in emission order.
pub fn page_document(nodes: &[PageNode], canvas: CanvasSize) -> PageLayer {
    PageLayer::Page(Container {
        object_id: PAGE_ID.to_owned(),
        flags: LayerFlags::default(),
        name: PAGE_NAME.to_owned(),
        name_is_fixed: false,
        frame: Frame::new(PixelRect::default(), true),
        style: style(PAGE_ID),
        has_click_through: true,
        group_layout: group_layout(),
        layers: nodes.iter().map(|node| to_layer(node, canvas)).collect(),
        horizontal_ruler_data: Some(ruler()),
        vertical_ruler_data: Some(ruler()),
    })
}

/// An image copied from the `Content` tree into the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedImage {
    /// Relative to the `Content` directory.
    pub source: PathBuf,
    /// File name inside `images/`.
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct VectorPage {
    pub page: PageLayer,
    pub images: Vec<PackagedImage>,
}

pub fn build(records: &[ExportedLayerRecord], canvas: CanvasSize) -> VectorPage {
    let mut nodes = regroup(records);
    reverse_layers(&mut nodes);

    let images = records
        .iter()
        .filter(|record| record.visible)
        .map(|record| {
            let extension = record
                .image_path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| "png".to_owned());
            let address = content_address(&qualified_name(&record.hierarchy, &record.name));
            PackagedImage {
                source: record.image_path.clone(),
                file_name: format!("{address}.{extension}"),
            }
        })
        .collect();

    VectorPage { page: page_document(&nodes, canvas), images }
}

pub fn staging_dir(config: &ExportConfig) -> PathBuf {
    config.output_dir().join("package")
}

/// Lays out the package directory and returns its path.
pub fn write_package(page: &VectorPage, config: &ExportConfig, options: &VectorOptions) -> RunResult<PathBuf> {
    let staging = staging_dir(config);

    if let Some(template) = &options.template_dir {
        let copied = copy_tree(template, &staging)?;
        log::debug!("copied {copied} template file(s) from {}", template.display());
    }

    let pages = staging.join("pages");
    let images = staging.join("images");
    let previews = staging.join("previews");
    for dir in [&pages, &images, &previews] {
        fs::create_dir_all(dir)?;
    }

    let content_dir = super::files::content_dir(config);
    for image in &page.images {
        fs::copy(content_dir.join(&image.source), images.join(&image.file_name))?;
    }

    let preview = config.preview_path();
    if preview.is_file() {
        fs::copy(&preview, previews.join("preview.png"))?;
    }

    fs::write(pages.join(format!("{PAGE_ID}.json")), super::pretty_json(&page.page)?)?;
    log::info!("staged vector package with {} image(s) in {}", page.images.len(), staging.display());
    Ok(staging)
}

/// Archives the staged package into `<root>/<name>.<extension>` and removes
/// the intermediate output tree. On failure the tree is left for inspection.
pub fn finalize(
    archiver: &mut dyn Archiver,
    staging: &Path,
    config: &ExportConfig,
    options: &VectorOptions,
) -> RunResult<PathBuf> {
    let zip = config.output_root.join(format!("{}.zip", config.name));
    archiver.archive(staging, &zip)?;

    let archive = config.output_root.join(format!("{}.{}", config.name, options.extension));
    if archive != zip {
        if archive.is_file() {
            fs::remove_file(&archive)?;
        }
        fs::rename(&zip, &archive)?;
    }

    fs::remove_dir_all(config.output_dir())?;
    log::info!("wrote {}", archive.display());
    Ok(archive)
}

fn copy_tree(source: &Path, destination: &Path) -> RunResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
