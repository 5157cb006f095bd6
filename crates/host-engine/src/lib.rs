//! Host editor capabilities consumed by the export core.
//!
//! The core never touches an editor directly. It drives a [`HostDocument`]
//! for layer listing and visibility, an [`ImageExporter`] for encoding the
//! visible composite, and an [`Archiver`] for packaging. [`MemoryDocument`]
//! is the default in-memory backend used by the CLI and tests.

use image::{ImageBuffer, Rgba};
use layer_model::{CanvasSize, ImageFormat, LayerDescriptor, LayerHandle, PixelRect, TextItem};
use std::path::Path;

mod archive;
mod exporter;
mod memory;

pub use archive::{ArchiveError, Archiver, SystemZipArchiver};
pub use exporter::RasterExporter;
pub use memory::{DocumentSpec, LayerSpec, MemoryDocument};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("document description error: {0}")]
    Description(#[from] serde_json::Error),
    #[error("invalid layer handle {0}")]
    InvalidHandle(u32),
    #[error("layer {0} has no embedded document")]
    NotEmbedded(u32),
    #[error("embedded document of layer {0} is already open")]
    EmbeddedAlreadyOpen(u32),
    #[error("embedded document of layer {0} is not open")]
    EmbeddedNotOpen(u32),
    #[error("region {0:?} is empty")]
    EmptyRegion(PixelRect),
    #[error("host rejected operation: {0}")]
    Rejected(String),
}

/// The editor's live document, passed explicitly through every call.
///
/// Layer listing follows the host stacking order: entries come top to bottom,
/// groups are bracketed by a `Start` and an `End` entry, and the background
/// layer (if any) is the trailing entry.
pub trait HostDocument {
    fn name(&self) -> &str;
    fn canvas_size(&self) -> CanvasSize;
    /// Pixels per inch.
    fn resolution(&self) -> f64;
    fn list_layers_flat(&self) -> Result<Vec<LayerDescriptor>, HostError>;
    fn is_visible(&self, layer: LayerHandle) -> Result<bool, HostError>;
    fn set_visible(&mut self, layer: LayerHandle, visible: bool) -> Result<(), HostError>;
    fn layer_bounds(&self, layer: LayerHandle) -> Result<PixelRect, HostError>;
    fn text_item(&self, layer: LayerHandle) -> Result<Option<TextItem>, HostError>;
    fn current_crop(&self) -> PixelRect;
    /// Crops the exportable canvas and returns the crop that was in effect before.
    fn crop_to(&mut self, rect: PixelRect) -> Result<PixelRect, HostError>;
    fn restore_crop(&mut self, prior: PixelRect) -> Result<(), HostError>;
    /// Opens the sub-document embedded in a smart-object layer.
    ///
    /// Must be paired with [`close_embedded`](Self::close_embedded).
    fn open_embedded(&mut self, layer: LayerHandle) -> Result<&mut dyn HostDocument, HostError>;
    /// Closes an embedded document; `commit == false` discards its changes.
    fn close_embedded(&mut self, layer: LayerHandle, commit: bool) -> Result<(), HostError>;
    /// Composite of the currently visible layers inside `region`.
    fn render_region(&self, region: PixelRect) -> Result<RgbaImage, HostError>;
}

pub trait ImageExporter {
    fn export_region(
        &mut self,
        document: &dyn HostDocument,
        region: PixelRect,
        destination: &Path,
        format: ImageFormat,
    ) -> Result<(), HostError>;
}

pub fn default_exporter() -> RasterExporter {
    RasterExporter::new()
}
