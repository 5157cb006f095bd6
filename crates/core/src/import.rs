//! Rebuilds a UI node tree from an engine-import manifest.
//!
//! Layers are instantiated back to front, so the manifest is walked in
//! reverse. Groups are created on demand from each layer's hierarchy path
//! and reused by full path. Nothing here fails on missing assets: absent
//! images and unknown fonts are collected in the [`ImportReport`].

use crate::manifest::engine::{EngineLayer, EngineManifest, TransformParams};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEXT_SCALE: f64 = 1.45;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UiNodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Fills the parent; position and size are deltas.
    Stretch,
    /// Anchored at the parent's center.
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RectTransform {
    pub anchor: Anchor,
    pub position: [i64; 2],
    pub size: [i64; 2],
}

impl RectTransform {
    pub fn stretch() -> Self {
        Self { anchor: Anchor::Stretch, position: [0, 0], size: [0, 0] }
    }

    pub fn centered(params: &TransformParams) -> Self {
        Self {
            anchor: Anchor::Center,
            position: [params.pos_x, params.pos_y],
            size: [params.width, params.height],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiContent<H> {
    Window { reference_width: u32, reference_height: u32 },
    Group,
    Image { path: PathBuf },
    Text { text: String, font_name: String, font: H, size: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiNode<H> {
    pub name: String,
    pub parent: Option<UiNodeId>,
    pub children: Vec<UiNodeId>,
    pub rect: RectTransform,
    pub content: UiContent<H>,
}

impl<H> UiNode<H> {
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, UiContent::Image { .. } | UiContent::Text { .. })
    }
}

/// Arena of UI nodes. Node 0 is the stretched root window.
#[derive(Debug, Clone, Serialize)]
pub struct UiTree<H> {
    nodes: Vec<UiNode<H>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineKind {
    Group,
    Image,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub depth: usize,
    pub name: String,
    pub kind: OutlineKind,
}

impl<H> UiTree<H> {
    fn new(reference_width: u32, reference_height: u32) -> Self {
        Self {
            nodes: vec![UiNode {
                name: "Window".to_owned(),
                parent: None,
                children: Vec::new(),
                rect: RectTransform::stretch(),
                content: UiContent::Window { reference_width, reference_height },
            }],
        }
    }

    pub fn root(&self) -> UiNodeId {
        UiNodeId(0)
    }

    pub fn node(&self, id: UiNodeId) -> &UiNode<H> {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: UiNodeId) -> &[UiNodeId] {
        &self.node(id).children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Deepest chain of nested groups below the root window.
    pub fn max_group_depth(&self) -> usize {
        (0..self.nodes.len())
            .filter(|index| matches!(self.nodes[*index].content, UiContent::Group))
            .map(|index| {
                let mut depth = 0;
                let mut current = Some(UiNodeId(index));
                while let Some(id) = current {
                    if matches!(self.node(id).content, UiContent::Group) {
                        depth += 1;
                    }
                    current = self.node(id).parent;
                }
                depth
            })
            .max()
            .unwrap_or(0)
    }

    /// Depth-first listing of groups and leaves in stored child order.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        let mut stack: Vec<(UiNodeId, usize)> =
            self.children(self.root()).iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            let kind = match node.content {
                UiContent::Text { .. } => OutlineKind::Text,
                UiContent::Image { .. } => OutlineKind::Image,
                UiContent::Group | UiContent::Window { .. } => OutlineKind::Group,
            };
            entries.push(OutlineEntry { depth, name: node.name.clone(), kind });
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }

        entries
    }

    fn push(&mut self, parent: UiNodeId, name: String, rect: RectTransform, content: UiContent<H>) -> UiNodeId {
        let id = UiNodeId(self.nodes.len());
        self.nodes.push(UiNode { name, parent: Some(parent), children: Vec::new(), rect, content });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Returns the group node for a layer's hierarchy, creating missing groups.
    fn group_for(&mut self, groups: &mut HashMap<String, UiNodeId>, layer: &EngineLayer) -> UiNodeId {
        let mut parent = self.root();
        let mut path = String::new();

        for segment in layer.groups() {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);

            parent = match groups.get(&path) {
                Some(id) => *id,
                None => {
                    let id = self.push(parent, segment.to_owned(), RectTransform::stretch(), UiContent::Group);
                    groups.insert(path.clone(), id);
                    id
                }
            };
        }

        parent
    }
}

/// Font handles by font name, with a fallback for unknown names.
#[derive(Debug, Clone)]
pub struct FontTable<H> {
    fonts: HashMap<String, H>,
    fallback: H,
}

impl<H> FontTable<H> {
    pub fn new(fallback: H) -> Self {
        Self { fonts: HashMap::new(), fallback }
    }

    pub fn insert(&mut self, name: impl Into<String>, handle: H) -> Option<H> {
        self.fonts.insert(name.into(), handle)
    }

    pub fn with(mut self, name: impl Into<String>, handle: H) -> Self {
        self.insert(name, handle);
        self
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.fonts.get(name)
    }

    pub fn fallback(&self) -> &H {
        &self.fallback
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Instantiate text layers as live text instead of their exported image.
    pub text_as_text: bool,
    /// Multiplier from exported pixel size to the engine's font size.
    pub text_scale: f64,
    pub image_extension: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            text_as_text: false,
            text_scale: DEFAULT_TEXT_SCALE,
            image_extension: "png".to_owned(),
        }
    }
}

/// A font to assign, with the first text layer that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontRequest {
    pub font: String,
    pub layer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport<H> {
    pub tree: UiTree<H>,
    pub fonts: Vec<FontRequest>,
    pub unresolved_fonts: Vec<String>,
    pub missing_images: Vec<PathBuf>,
}

/// Unique font names of text layers, in manifest order.
pub fn font_worklist(manifest: &EngineManifest) -> Vec<FontRequest> {
    let mut requests: Vec<FontRequest> = Vec::new();
    for layer in manifest.layers.iter().filter(|layer| layer.is_text()) {
        let Some(params) = &layer.text_params else {
            continue;
        };
        if !requests.iter().any(|request| request.font == params.font) {
            requests.push(FontRequest { font: params.font.clone(), layer: layer.name.clone() });
        }
    }
    requests
}

/// `<base>/Content/<hierarchy>/<fileName>.<ext>`
pub fn image_path(base_dir: &Path, layer: &EngineLayer, extension: &str) -> PathBuf {
    let mut path = base_dir.join("Content");
    path.extend(layer.groups());
    path.push(format!("{}.{extension}", layer.file_name));
    path
}

pub fn reconstruct<H: Clone>(
    manifest: &EngineManifest,
    base_dir: &Path,
    fonts: &FontTable<H>,
    options: &ImportOptions,
) -> ImportReport<H> {
    let mut tree = UiTree::new(manifest.canvas.width, manifest.canvas.height);
    let mut groups = HashMap::new();
    let mut unresolved_fonts: Vec<String> = Vec::new();
    let mut missing_images = Vec::new();

    for layer in manifest.layers.iter().rev() {
        let parent = tree.group_for(&mut groups, layer);
        let text = layer.text_params.as_ref().filter(|_| options.text_as_text && layer.is_text());

        let content = match text {
            Some(params) => {
                let font = match fonts.get(&params.font) {
                    Some(handle) => handle.clone(),
                    None => {
                        if !unresolved_fonts.contains(&params.font) {
                            log::warn!("font {:?} is not assigned, using the default font", params.font);
                            unresolved_fonts.push(params.font.clone());
                        }
                        fonts.fallback().clone()
                    }
                };
                UiContent::Text {
                    text: params.text.clone(),
                    font_name: params.font.clone(),
                    font,
                    size: params.size * options.text_scale,
                }
            }
            None => {
                let path = image_path(base_dir, layer, &options.image_extension);
                if !path.is_file() {
                    log::warn!("image for layer {:?} not found at {}", layer.name, path.display());
                    missing_images.push(path.clone());
                }
                UiContent::Image { path }
            }
        };

        tree.push(parent, layer.name.clone(), RectTransform::centered(&layer.transform_params), content);
    }

    log::info!("rebuilt {} node(s) from {} layer(s)", tree.len(), manifest.layers.len());
    ImportReport { tree, fonts: font_worklist(manifest), unresolved_fonts, missing_images }
}

/// Groups and leaves in manifest order, for previewing a manifest before
/// import. Touches no files.
pub fn outline(manifest: &EngineManifest) -> Vec<OutlineEntry> {
    let mut tree: UiTree<()> = UiTree::new(manifest.canvas.width, manifest.canvas.height);
    let mut groups = HashMap::new();

    for layer in &manifest.layers {
        let parent = tree.group_for(&mut groups, layer);
        let content = match &layer.text_params {
            Some(params) if layer.is_text() => UiContent::Text {
                text: params.text.clone(),
                font_name: params.font.clone(),
                font: (),
                size: params.size,
            },
            _ => UiContent::Image { path: image_path(Path::new(""), layer, "png") },
        };
        tree.push(parent, layer.name.clone(), RectTransform::centered(&layer.transform_params), content);
    }

    tree.outline()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::engine;
    use crate::testing::{record, text_record};
    use layer_model::{CanvasSize, ExportedLayerRecord};
    use std::fs;

    fn menu_manifest() -> EngineManifest {
        engine::build(
            &[
                text_record("Title", &["Menu"], "Start", "Arial-BoldMT"),
                record("Play", &["Menu", "Buttons"], [100, 100, 140, 180]),
                record("Quit", &["Menu", "Buttons"], [160, 100, 200, 180]),
                text_record("Footer", &[], "v1", "Arial-BoldMT"),
                text_record("Hint", &[], "Press", "Georgia"),
            ],
            CanvasSize { width: 400, height: 300 },
        )
    }

    fn names(tree: &UiTree<String>, id: UiNodeId) -> Vec<&str> {
        tree.children(id).iter().map(|child| tree.node(*child).name.as_str()).collect()
    }

    #[test]
    fn round_trip_preserves_leaves_and_depth() {
        let temp = tempfile::tempdir().unwrap();
        let report = reconstruct(
            &menu_manifest(),
            temp.path(),
            &FontTable::new("default".to_owned()),
            &ImportOptions::default(),
        );

        assert_eq!(report.tree.leaf_count(), 5);
        assert_eq!(report.tree.max_group_depth(), 2);
    }

    #[test]
    fn layers_are_instantiated_back_to_front() {
        let temp = tempfile::tempdir().unwrap();
        let report = reconstruct(
            &menu_manifest(),
            temp.path(),
            &FontTable::new("default".to_owned()),
            &ImportOptions::default(),
        );
        let tree = &report.tree;

        assert_eq!(names(tree, tree.root()), vec!["Hint", "Footer", "Menu"]);
        let menu = tree.children(tree.root())[2];
        assert_eq!(names(tree, menu), vec!["Buttons", "Title"]);
        let buttons = tree.children(menu)[0];
        assert_eq!(names(tree, buttons), vec!["Quit", "Play"]);
        assert_eq!(tree.node(buttons).rect, RectTransform::stretch());

        let play = tree.node(tree.children(buttons)[1]);
        assert_eq!(play.rect.position, [-80, 10]);
        assert_eq!(play.rect.size, [40, 80]);
    }

    #[test]
    fn repeated_group_path_reuses_node() {
        let temp = tempfile::tempdir().unwrap();
        let report = reconstruct(
            &menu_manifest(),
            temp.path(),
            &FontTable::new(()),
            &ImportOptions::default(),
        );

        let groups = report
            .tree
            .outline()
            .into_iter()
            .filter(|entry| entry.kind == OutlineKind::Group)
            .count();
        assert_eq!(groups, 2);
    }

    #[test]
    fn text_layers_become_text_with_scaled_size() {
        let temp = tempfile::tempdir().unwrap();
        let fonts = FontTable::new("default".to_owned()).with("Arial-BoldMT", "arial.asset".to_owned());
        let options = ImportOptions { text_as_text: true, ..Default::default() };

        let report = reconstruct(&menu_manifest(), temp.path(), &fonts, &options);

        let tree = &report.tree;
        let footer = tree.node(tree.children(tree.root())[1]);
        let UiContent::Text { text, font, size, .. } = &footer.content else {
            panic!("expected text, got {:?}", footer.content);
        };
        assert_eq!(text, "v1");
        assert_eq!(font, "arial.asset");
        assert!((size - 18.0 * 1.45).abs() < 1e-9);

        let hint = tree.node(tree.children(tree.root())[0]);
        assert!(matches!(&hint.content, UiContent::Text { font, .. } if font == "default"));
        assert_eq!(report.unresolved_fonts, vec!["Georgia"]);
    }

    #[test]
    fn text_stays_image_unless_requested() {
        let temp = tempfile::tempdir().unwrap();
        let report = reconstruct(&menu_manifest(), temp.path(), &FontTable::new(()), &ImportOptions::default());

        let footer = report.tree.node(report.tree.children(report.tree.root())[1]);
        assert_eq!(
            footer.content,
            UiContent::Image { path: temp.path().join("Content/Footer.png") }
        );
        assert!(report.unresolved_fonts.is_empty());
    }

    #[test]
    fn missing_images_are_reported_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Content/Menu/Buttons")).unwrap();
        fs::write(temp.path().join("Content/Menu/Buttons/Play.png"), b"png").unwrap();

        let report = reconstruct(&menu_manifest(), temp.path(), &FontTable::new(()), &ImportOptions::default());

        assert_eq!(report.missing_images.len(), 4);
        assert!(!report
            .missing_images
            .contains(&temp.path().join("Content/Menu/Buttons/Play.png")));
    }

    #[test]
    fn nodes_keep_raw_names_and_images_use_file_names() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Content/Menu")).unwrap();
        fs::write(temp.path().join("Content/Menu/PlayButton.png"), b"png").unwrap();
        let layer = ExportedLayerRecord {
            name: "PlayButton".to_owned(),
            raw_name: "Play Button".to_owned(),
            ..record("PlayButton", &["Menu"], [0, 0, 10, 10])
        };
        let manifest = engine::build(&[layer], CanvasSize { width: 100, height: 100 });

        let report = reconstruct(&manifest, temp.path(), &FontTable::new(()), &ImportOptions::default());
        let tree = &report.tree;
        let menu = tree.children(tree.root())[0];
        let leaf = tree.node(tree.children(menu)[0]);

        assert_eq!(leaf.name, "Play Button");
        assert_eq!(leaf.content, UiContent::Image { path: temp.path().join("Content/Menu/PlayButton.png") });
        assert!(report.missing_images.is_empty());
    }

    #[test]
    fn font_worklist_is_unique_in_manifest_order() {
        let requests = font_worklist(&menu_manifest());

        assert_eq!(
            requests,
            vec![
                FontRequest { font: "Arial-BoldMT".to_owned(), layer: "Title".to_owned() },
                FontRequest { font: "Georgia".to_owned(), layer: "Hint".to_owned() },
            ]
        );
    }

    #[test]
    fn outline_keeps_manifest_order() {
        let entries = outline(&menu_manifest());

        let flat: Vec<(usize, &str)> = entries.iter().map(|e| (e.depth, e.name.as_str())).collect();
        assert_eq!(
            flat,
            vec![
                (0, "Menu"),
                (1, "Title"),
                (1, "Buttons"),
                (2, "Play"),
                (2, "Quit"),
                (0, "Footer"),
                (0, "Hint"),
            ]
        );
        assert_eq!(entries[1].kind, OutlineKind::Text);
    }
}
