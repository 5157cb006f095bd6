//! Counting, collecting and exporting passes over the layer listing.
//!
//! Counting and collecting poll for cancellation at the first entry, at
//! every [`POLL_INTERVAL`]th entry and at the last entry. The export pass
//! polls after every layer.

use crate::cancel::CancellationToken;
use crate::error::{RunError, RunResult};
use crate::manifest::files;
use crate::progress::{Phase, Progress};
use crate::sanitize::{sanitize, sanitize_path};
use crate::tree::{walk_brackets, BracketEvent, LayerNode, LayerTree, NodeId, TreeBuilder};
use crate::visibility::VisibilityController;
use host_engine::{HostDocument, HostError, ImageExporter};
use layer_model::{
    ExportConfig, ExportedLayerRecord, FailurePolicy, LayerDescriptor, LayerKind, PixelRect,
    TextAttributes,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

pub const POLL_INTERVAL: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LayerCounts {
    /// Content layers in the document, adjustments excluded.
    pub total: usize,
    /// Content layers whose own flag and every ancestor's flag are set.
    pub visible: usize,
}

impl LayerCounts {
    pub fn candidates(&self, visible_only: bool) -> usize {
        if visible_only {
            self.visible
        } else {
            self.total
        }
    }
}

/// A layer the export pass gave up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerFailure {
    pub raw_name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ExportPass {
    pub records: Vec<ExportedLayerRecord>,
    pub failures: Vec<LayerFailure>,
    pub cancelled: bool,
}

fn should_poll(index: usize, last: usize) -> bool {
    index == 0 || index == last || index % POLL_INTERVAL == 0
}

pub fn count_layers(
    descriptors: &[LayerDescriptor],
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> RunResult<LayerCounts> {
    let last = descriptors.len().saturating_sub(1);
    let mut counts = LayerCounts::default();
    progress.begin(Phase::Counting, descriptors.len());

    walk_brackets(descriptors, |index, event| {
        if let BracketEvent::Content { descriptor, visible } = event {
            if descriptor.kind.is_content() {
                counts.total += 1;
                counts.visible += usize::from(visible);
            }
        }
        poll(index, last, cancel, &mut *progress)
    })?;

    progress.finish();
    Ok(counts)
}

pub fn collect_layers(
    descriptors: &[LayerDescriptor],
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> RunResult<LayerTree> {
    let last = descriptors.len().saturating_sub(1);
    let mut builder = TreeBuilder::default();
    progress.begin(Phase::Collecting, descriptors.len());

    walk_brackets(descriptors, |index, event| {
        builder.apply(event);
        poll(index, last, cancel, &mut *progress)
    })?;

    progress.finish();
    Ok(builder.finish())
}

fn poll(
    index: usize,
    last: usize,
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> RunResult<()> {
    if should_poll(index, last) {
        progress.advance(index + 1);
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
    }
    Ok(())
}

/// Exports every candidate layer of a collected tree as its own image.
pub struct LayerExporter<'a> {
    document: &'a mut dyn HostDocument,
    exporter: &'a mut dyn ImageExporter,
    config: &'a ExportConfig,
    cancel: &'a CancellationToken,
    progress: &'a mut dyn Progress,
}

impl<'a> LayerExporter<'a> {
    pub fn new(
        document: &'a mut dyn HostDocument,
        exporter: &'a mut dyn ImageExporter,
        config: &'a ExportConfig,
        cancel: &'a CancellationToken,
        progress: &'a mut dyn Progress,
    ) -> Self {
        Self { document, exporter, config, cancel, progress }
    }

    pub fn export_layers(&mut self, tree: &LayerTree) -> RunResult<ExportPass> {
        let candidates: Vec<NodeId> = if self.config.visible_only {
            tree.visible_content_layers().collect()
        } else {
            tree.content_layers().to_vec()
        };

        let mut controller = VisibilityController::new();
        controller.hide_all(tree, &mut *self.document, &candidates)?;

        let content_dir = files::content_dir(self.config);
        std::fs::create_dir_all(&content_dir)?;

        if tree.is_single_background() {
            return self.export_background(tree, &mut controller, &content_dir);
        }

        let mut pass = ExportPass::default();
        let mut written = HashSet::new();
        self.progress.begin(Phase::Exporting, candidates.len());

        for (position, &id) in candidates.iter().enumerate() {
            let node = tree.node(id);
            match self.export_one(tree, id, &content_dir, &mut controller) {
                Ok(record) => {
                    if !written.insert(record.image_path.clone()) {
                        log::warn!(
                            "{} overwrites an image exported earlier in this run",
                            record.image_path.display()
                        );
                    }
                    pass.records.push(record);
                }
                Err(RunError::LayerNameInvalid(raw_name)) => {
                    log::warn!("skipping layer {raw_name:?}: name is empty after sanitizing");
                    pass.failures.push(LayerFailure {
                        raw_name,
                        reason: "name is empty after sanitizing".to_owned(),
                    });
                }
                Err(RunError::Host(err)) if self.config.failure_policy != FailurePolicy::Abort => {
                    log::warn!("skipping layer {:?}: {err}", node.name);
                    pass.failures.push(LayerFailure {
                        raw_name: node.name.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }

            self.progress.advance(position + 1);
            if self.cancel.is_cancelled() {
                log::info!("export cancelled after {} layer(s)", pass.records.len());
                pass.cancelled = true;
                break;
            }
        }

        self.progress.finish();
        Ok(pass)
    }

    fn export_one(
        &mut self,
        tree: &LayerTree,
        id: NodeId,
        content_dir: &Path,
        controller: &mut VisibilityController,
    ) -> RunResult<ExportedLayerRecord> {
        let node = tree.node(id);
        let name = sanitize(&node.name);
        let hierarchy = sanitize_path(tree.group_path(id))
            .filter(|_| !name.is_empty())
            .ok_or_else(|| RunError::LayerNameInvalid(node.name.clone()))?;

        let image_path = files::layer_image_path(&hierarchy, &name, self.config.format);
        files::ensure_layer_dirs(content_dir, &hierarchy)?;
        let destination = content_dir.join(&image_path);
        let bounds = self.document.layer_bounds(node.handle)?;

        let attempts = match self.config.failure_policy {
            FailurePolicy::Retry { attempts } => attempts.saturating_add(1),
            FailurePolicy::Abort | FailurePolicy::Skip => 1,
        };

        let scope = controller.isolate(tree, &mut *self.document, id)?;
        let mut captured = Ok(());
        for attempt in 1..=attempts {
            captured = self.capture(node, bounds, &destination);
            match &captured {
                Ok(()) => break,
                Err(err) if attempt < attempts => {
                    log::warn!("attempt {attempt} for layer {:?} failed: {err}", node.name);
                }
                Err(_) => {}
            }
        }
        controller.revert(&mut *self.document, scope)?;
        captured?;

        let text = if node.kind == LayerKind::Text {
            self.document
                .text_item(node.handle)?
                .map(|item| TextAttributes::from_item(&item, self.document.resolution()))
        } else {
            None
        };

        log::debug!("exported {:?} to {}", node.name, destination.display());
        Ok(ExportedLayerRecord {
            name,
            raw_name: node.name.clone(),
            hierarchy,
            bounds,
            kind: node.kind,
            visible: node.effective_visible,
            text,
            image_path,
        })
    }

    /// Crops to the layer, exports, and restores the previous crop.
    fn capture(&mut self, node: &LayerNode, bounds: PixelRect, destination: &Path) -> Result<(), HostError> {
        let prior = self.document.crop_to(bounds)?;
        let exported = if node.kind == LayerKind::SmartObject {
            self.capture_embedded(node, destination)
        } else {
            self.exporter
                .export_region(&*self.document, bounds, destination, self.config.format)
        };
        self.document.restore_crop(prior)?;
        exported
    }

    /// Smart objects are exported from their embedded document at its own
    /// canvas size. The embedded document is closed without saving.
    fn capture_embedded(&mut self, node: &LayerNode, destination: &Path) -> Result<(), HostError> {
        let exported = {
            let embedded = self.document.open_embedded(node.handle)?;
            let canvas = embedded.canvas_size().to_rect();
            self.exporter
                .export_region(&*embedded, canvas, destination, self.config.format)
        };
        self.document.close_embedded(node.handle, false)?;
        exported
    }

    /// A document holding only its background is exported whole, named after
    /// the document.
    fn export_background(
        &mut self,
        tree: &LayerTree,
        controller: &mut VisibilityController,
        content_dir: &Path,
    ) -> RunResult<ExportPass> {
        let mut pass = ExportPass::default();
        let Some(&id) = tree.content_layers().first() else {
            return Ok(pass);
        };
        let node = tree.node(id);

        let document_name = self.document.name().to_owned();
        let stem = Path::new(&document_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = sanitize(&stem);
        if name.is_empty() {
            pass.failures.push(LayerFailure {
                raw_name: document_name,
                reason: "document name is empty after sanitizing".to_owned(),
            });
            return Ok(pass);
        }

        let image_path = files::layer_image_path(&[], &name, self.config.format);
        let destination = content_dir.join(&image_path);
        let canvas = self.document.canvas_size().to_rect();

        let scope = controller.isolate(tree, &mut *self.document, id)?;
        let exported =
            self.exporter
                .export_region(&*self.document, canvas, &destination, self.config.format);
        controller.revert(&mut *self.document, scope)?;
        exported?;

        pass.records.push(ExportedLayerRecord {
            name,
            raw_name: node.name.clone(),
            hierarchy: Vec::new(),
            bounds: canvas,
            kind: node.kind,
            visible: node.effective_visible,
            text: None,
            image_path,
        });
        Ok(pass)
    }
}
