//! Full-canvas `Preview.png` written next to the exported content.

use crate::error::RunResult;
use host_engine::{HostDocument, HostError, ImageExporter};
use layer_model::{ExportConfig, ImageFormat, LayerKind, SectionMarker};
use std::fs;
use std::path::PathBuf;

/// Turns every layer on, except text layers when `hide_text` is set.
pub fn show_all_for_preview(document: &mut dyn HostDocument, hide_text: bool) -> Result<(), HostError> {
    for descriptor in document.list_layers_flat()? {
        if descriptor.marker == SectionMarker::End {
            continue;
        }
        let visible = !(hide_text && descriptor.kind == LayerKind::Text);
        if descriptor.visible != visible {
            document.set_visible(descriptor.handle, visible)?;
        }
    }
    Ok(())
}

pub fn write_preview(
    document: &mut dyn HostDocument,
    exporter: &mut dyn ImageExporter,
    config: &ExportConfig,
) -> RunResult<PathBuf> {
    show_all_for_preview(document, config.target.hides_text())?;

    let path = config.preview_path();
    fs::create_dir_all(config.output_dir())?;
    let canvas = document.canvas_size().to_rect();
    exporter.export_region(&*document, canvas, &path, ImageFormat::Png)?;

    log::info!("wrote preview to {}", path.display());
    Ok(path)
}
