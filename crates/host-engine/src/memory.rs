use crate::{HostDocument, HostError, RgbaImage};
use image::Rgba;
use layer_model::{
    CanvasSize, LayerDescriptor, LayerHandle, LayerKind, PixelRect, SectionMarker, TextItem,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const SECTION_END_NAME: &str = "</Layer group>";
const DEFAULT_FILL: [u8; 4] = [128, 128, 128, 255];
const BACKGROUND_FILL: [u8; 4] = [255, 255, 255, 255];

fn default_resolution() -> f64 {
    72.0
}

fn default_true() -> bool {
    true
}

fn default_background_name() -> String {
    "Background".to_owned()
}

/// Nested JSON description of a document, top-most layer first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub background: Option<BackgroundSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSpec {
    #[serde(default = "default_background_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub color: Option<[u8; 4]>,
}

/// Bounds are `[left, top, right, bottom]` in document pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Group {
        name: String,
        #[serde(default = "default_true")]
        visible: bool,
        #[serde(default)]
        children: Vec<LayerSpec>,
    },
    Image {
        name: String,
        #[serde(default = "default_true")]
        visible: bool,
        bounds: [i64; 4],
        #[serde(default)]
        color: Option<[u8; 4]>,
    },
    Text {
        name: String,
        #[serde(default = "default_true")]
        visible: bool,
        bounds: [i64; 4],
        text: String,
        font: String,
        size: f64,
        #[serde(default)]
        color: Option<[u8; 4]>,
    },
    SmartObject {
        name: String,
        #[serde(default = "default_true")]
        visible: bool,
        bounds: [i64; 4],
        document: Box<DocumentSpec>,
    },
    Adjustment {
        name: String,
        #[serde(default = "default_true")]
        visible: bool,
    },
}

#[derive(Debug, Clone)]
struct Saved {
    visibility: Vec<bool>,
    crop: PixelRect,
}

#[derive(Debug, Clone)]
struct Embedded {
    document: Box<MemoryDocument>,
    /// Present while the embedded document is open.
    saved: Option<Saved>,
}

#[derive(Debug, Clone)]
struct Entry {
    descriptor: LayerDescriptor,
    bounds: PixelRect,
    color: [u8; 4],
    text: Option<TextItem>,
    embedded: Option<Embedded>,
}

impl Entry {
    fn new(index: usize, name: &str, marker: SectionMarker, visible: bool, kind: LayerKind) -> Self {
        Self {
            descriptor: LayerDescriptor {
                handle: LayerHandle(index as u32),
                name: name.to_owned(),
                marker,
                visible,
                kind,
            },
            bounds: PixelRect::default(),
            color: DEFAULT_FILL,
            text: None,
            embedded: None,
        }
    }
}

/// In-memory host document built from a [`DocumentSpec`].
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    name: String,
    size: CanvasSize,
    resolution: f64,
    entries: Vec<Entry>,
    crop: PixelRect,
}

impl MemoryDocument {
    pub fn from_spec(spec: &DocumentSpec) -> Self {
        let size = CanvasSize { width: spec.width, height: spec.height };
        let mut entries = Vec::new();
        flatten(&spec.layers, size.to_rect(), &mut entries);

        if let Some(background) = &spec.background {
            let index = entries.len();
            let mut entry = Entry::new(
                index,
                &background.name,
                SectionMarker::Content,
                background.visible,
                LayerKind::Background,
            );
            entry.bounds = size.to_rect();
            entry.color = background.color.unwrap_or(BACKGROUND_FILL);
            entries.push(entry);
        }

        Self {
            name: spec.name.clone(),
            size,
            resolution: spec.resolution,
            entries,
            crop: size.to_rect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, HostError> {
        let spec: DocumentSpec = serde_json::from_str(json)?;
        Ok(Self::from_spec(&spec))
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let bytes = fs::read(path)?;
        let spec: DocumentSpec = serde_json::from_slice(&bytes)?;
        Ok(Self::from_spec(&spec))
    }

    /// First group or content layer with the given name, top-most first.
    pub fn find_layer(&self, name: &str) -> Option<LayerHandle> {
        self.entries
            .iter()
            .find(|entry| {
                entry.descriptor.marker != SectionMarker::End && entry.descriptor.name == name
            })
            .map(|entry| entry.descriptor.handle)
    }

    pub fn embedded(&self, layer: LayerHandle) -> Option<&MemoryDocument> {
        self.entries
            .get(layer.raw() as usize)
            .and_then(|entry| entry.embedded.as_ref())
            .map(|embedded| embedded.document.as_ref())
    }

    pub fn is_embedded_open(&self, layer: LayerHandle) -> bool {
        self.entries
            .get(layer.raw() as usize)
            .and_then(|entry| entry.embedded.as_ref())
            .is_some_and(|embedded| embedded.saved.is_some())
    }

    /// Own visibility flag of every entry, in listing order.
    pub fn visibility_flags(&self) -> Vec<bool> {
        self.entries.iter().map(|entry| entry.descriptor.visible).collect()
    }

    fn apply_visibility_flags(&mut self, flags: &[bool]) {
        for (entry, visible) in self.entries.iter_mut().zip(flags) {
            entry.descriptor.visible = *visible;
        }
    }

    fn entry(&self, layer: LayerHandle) -> Result<&Entry, HostError> {
        self.entries.get(layer.raw() as usize).ok_or(HostError::InvalidHandle(layer.raw()))
    }

    fn entry_mut(&mut self, layer: LayerHandle) -> Result<&mut Entry, HostError> {
        self.entries.get_mut(layer.raw() as usize).ok_or(HostError::InvalidHandle(layer.raw()))
    }

    fn effective_visibility(&self) -> Vec<bool> {
        let mut stack = vec![true];
        let mut effective = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let parent = stack.last().copied().unwrap_or(true);
            let visible = parent && entry.descriptor.visible;
            match entry.descriptor.marker {
                SectionMarker::Start => {
                    effective.push(visible);
                    stack.push(visible);
                }
                SectionMarker::Content => effective.push(visible),
                SectionMarker::End => {
                    effective.push(false);
                    stack.pop();
                }
            }
        }

        effective
    }
}

fn union(acc: Option<PixelRect>, rect: PixelRect) -> Option<PixelRect> {
    if rect.is_empty() {
        return acc;
    }

    Some(match acc {
        None => rect,
        Some(acc) => PixelRect::new(
            acc.left.min(rect.left),
            acc.top.min(rect.top),
            acc.right.max(rect.right),
            acc.bottom.max(rect.bottom),
        ),
    })
}

fn rect_of(bounds: &[i64; 4]) -> PixelRect {
    PixelRect::new(bounds[0], bounds[1], bounds[2], bounds[3])
}

fn flatten(specs: &[LayerSpec], canvas: PixelRect, entries: &mut Vec<Entry>) -> Option<PixelRect> {
    let mut extent = None;

    for spec in specs {
        let index = entries.len();
        match spec {
            LayerSpec::Group { name, visible, children } => {
                entries.push(Entry::new(index, name, SectionMarker::Start, *visible, LayerKind::Group));
                let inner = flatten(children, canvas, entries);
                entries[index].bounds = inner.unwrap_or_default();
                extent = inner.map_or(extent, |inner| union(extent, inner));

                let end = entries.len();
                entries.push(Entry::new(
                    end,
                    SECTION_END_NAME,
                    SectionMarker::End,
                    false,
                    LayerKind::Group,
                ));
            }
            LayerSpec::Image { name, visible, bounds, color } => {
                let mut entry =
                    Entry::new(index, name, SectionMarker::Content, *visible, LayerKind::Image);
                entry.bounds = rect_of(bounds);
                entry.color = color.unwrap_or(DEFAULT_FILL);
                extent = union(extent, entry.bounds);
                entries.push(entry);
            }
            LayerSpec::Text { name, visible, bounds, text, font, size, color } => {
                let mut entry =
                    Entry::new(index, name, SectionMarker::Content, *visible, LayerKind::Text);
                entry.bounds = rect_of(bounds);
                entry.color = color.unwrap_or(DEFAULT_FILL);
                entry.text =
                    Some(TextItem { contents: text.clone(), font: font.clone(), size_pt: *size });
                extent = union(extent, entry.bounds);
                entries.push(entry);
            }
            LayerSpec::SmartObject { name, visible, bounds, document } => {
                let mut entry = Entry::new(
                    index,
                    name,
                    SectionMarker::Content,
                    *visible,
                    LayerKind::SmartObject,
                );
                entry.bounds = rect_of(bounds);
                entry.embedded = Some(Embedded {
                    document: Box::new(MemoryDocument::from_spec(document)),
                    saved: None,
                });
                extent = union(extent, entry.bounds);
                entries.push(entry);
            }
            LayerSpec::Adjustment { name, visible } => {
                let mut entry =
                    Entry::new(index, name, SectionMarker::Content, *visible, LayerKind::Adjustment);
                entry.bounds = canvas;
                entries.push(entry);
            }
        }
    }

    extent
}

impl HostDocument for MemoryDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn canvas_size(&self) -> CanvasSize {
        self.size
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }

    fn list_layers_flat(&self) -> Result<Vec<LayerDescriptor>, HostError> {
        Ok(self.entries.iter().map(|entry| entry.descriptor.clone()).collect())
    }

    fn is_visible(&self, layer: LayerHandle) -> Result<bool, HostError> {
        Ok(self.entry(layer)?.descriptor.visible)
    }

    fn set_visible(&mut self, layer: LayerHandle, visible: bool) -> Result<(), HostError> {
        self.entry_mut(layer)?.descriptor.visible = visible;
        Ok(())
    }

    fn layer_bounds(&self, layer: LayerHandle) -> Result<PixelRect, HostError> {
        Ok(self.entry(layer)?.bounds)
    }

    fn text_item(&self, layer: LayerHandle) -> Result<Option<TextItem>, HostError> {
        Ok(self.entry(layer)?.text.clone())
    }

    fn current_crop(&self) -> PixelRect {
        self.crop
    }

    fn crop_to(&mut self, rect: PixelRect) -> Result<PixelRect, HostError> {
        let clipped = rect.intersect(&self.size.to_rect());
        if clipped.is_empty() {
            return Err(HostError::EmptyRegion(rect));
        }

        let prior = self.crop;
        self.crop = clipped;
        Ok(prior)
    }

    fn restore_crop(&mut self, prior: PixelRect) -> Result<(), HostError> {
        self.crop = prior;
        Ok(())
    }

    fn open_embedded(&mut self, layer: LayerHandle) -> Result<&mut dyn HostDocument, HostError> {
        let entry = self.entry_mut(layer)?;
        let embedded = entry.embedded.as_mut().ok_or(HostError::NotEmbedded(layer.raw()))?;
        if embedded.saved.is_some() {
            return Err(HostError::EmbeddedAlreadyOpen(layer.raw()));
        }

        embedded.saved = Some(Saved {
            visibility: embedded.document.visibility_flags(),
            crop: embedded.document.crop,
        });

        let document: &mut dyn HostDocument = embedded.document.as_mut();
        Ok(document)
    }

    fn close_embedded(&mut self, layer: LayerHandle, commit: bool) -> Result<(), HostError> {
        let entry = self.entry_mut(layer)?;
        let embedded = entry.embedded.as_mut().ok_or(HostError::NotEmbedded(layer.raw()))?;
        let saved = embedded.saved.take().ok_or(HostError::EmbeddedNotOpen(layer.raw()))?;

        if !commit {
            embedded.document.apply_visibility_flags(&saved.visibility);
            embedded.document.crop = saved.crop;
        }

        Ok(())
    }

    fn render_region(&self, region: PixelRect) -> Result<RgbaImage, HostError> {
        let area = region.intersect(&self.crop);
        if area.is_empty() {
            return Err(HostError::EmptyRegion(region));
        }

        let mut image =
            RgbaImage::from_pixel(region.width() as u32, region.height() as u32, Rgba([0, 0, 0, 0]));
        let visible = self.effective_visibility();

        // Bottom-most entry first so upper layers paint over it.
        for (index, entry) in self.entries.iter().enumerate().rev() {
            let descriptor = &entry.descriptor;
            if descriptor.marker != SectionMarker::Content
                || !descriptor.kind.is_content()
                || !visible[index]
            {
                continue;
            }

            let painted = entry.bounds.intersect(&area);
            if painted.is_empty() {
                continue;
            }

            for y in painted.top..painted.bottom {
                for x in painted.left..painted.right {
                    image.put_pixel(
                        (x - region.left) as u32,
                        (y - region.top) as u32,
                        Rgba(entry.color),
                    );
                }
            }
        }

        Ok(image)
    }
}
