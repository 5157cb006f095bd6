//! One complete export run against a host document.

use crate::cancel::CancellationToken;
use crate::error::{RunError, RunResult};
use crate::manifest::{self, Emitted};
use crate::preview::write_preview;
use crate::progress::Progress;
use crate::text_policy::{hide_text_layers, HiddenText};
use crate::traverse::{collect_layers, count_layers, LayerCounts, LayerExporter, LayerFailure};
use crate::visibility::VisibilitySnapshot;
use host_engine::{Archiver, HostDocument, ImageExporter};
use layer_model::{ExportConfig, ExportedLayerRecord, TargetMode};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub status: RunStatus,
    pub mode: &'static str,
    pub counts: LayerCounts,
    pub exported: usize,
    pub failures: Vec<LayerFailure>,
    pub records: Vec<ExportedLayerRecord>,
    pub preview_path: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
}

impl ExportReport {
    fn cancelled(mode: &'static str, counts: LayerCounts) -> Self {
        Self {
            status: RunStatus::Cancelled,
            mode,
            counts,
            exported: 0,
            failures: Vec::new(),
            records: Vec::new(),
            preview_path: None,
            manifest_path: None,
            archive_path: None,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// One human-readable line describing the outcome.
    pub fn summary(&self) -> String {
        let candidates = self.exported + self.failed();
        match self.status {
            RunStatus::Completed => format!("exported {} layer(s) ({})", self.exported, self.mode),
            RunStatus::CompletedWithFailures => format!(
                "exported {} of {candidates} layer(s) ({}), {} failed",
                self.exported,
                self.mode,
                self.failed()
            ),
            RunStatus::Cancelled => format!("cancelled after exporting {} layer(s)", self.exported),
        }
    }
}

/// Runs count, collect, export and manifest emission.
///
/// The document's visibility is restored on every path, including errors
/// and cancellation. A cancelled run writes neither preview nor manifest.
pub fn run_export(
    document: &mut dyn HostDocument,
    exporter: &mut dyn ImageExporter,
    archiver: &mut dyn Archiver,
    config: &ExportConfig,
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> RunResult<ExportReport> {
    let snapshot = VisibilitySnapshot::capture(&*document)?;
    log::info!("starting {} export of {:?}", config.target.label(), document.name());

    let mut hidden = None;
    let outcome = match hide_text(document, &config.target) {
        Ok(text) => {
            hidden = text;
            run_passes(document, exporter, archiver, config, cancel, progress)
        }
        Err(err) => Err(err),
    };

    let restored = restore(document, hidden, &snapshot);
    let report = outcome?;
    restored?;

    log::info!("{}", report.summary());
    Ok(report)
}

fn hide_text(document: &mut dyn HostDocument, target: &TargetMode) -> RunResult<Option<HiddenText>> {
    if target.hides_text() {
        Ok(Some(hide_text_layers(document)?))
    } else {
        Ok(None)
    }
}

fn restore(
    document: &mut dyn HostDocument,
    hidden: Option<HiddenText>,
    snapshot: &VisibilitySnapshot,
) -> RunResult<()> {
    let shown = match hidden {
        Some(hidden) => hidden.restore(document),
        None => Ok(()),
    };
    // The snapshot is restored even if re-showing text failed.
    snapshot.restore(document)?;
    shown?;
    Ok(())
}

fn run_passes(
    document: &mut dyn HostDocument,
    exporter: &mut dyn ImageExporter,
    archiver: &mut dyn Archiver,
    config: &ExportConfig,
    cancel: &CancellationToken,
    progress: &mut dyn Progress,
) -> RunResult<ExportReport> {
    let mode = config.target.label();
    let descriptors = document.list_layers_flat()?;

    let counts = match count_layers(&descriptors, cancel, &mut *progress) {
        Ok(counts) => counts,
        Err(RunError::Cancelled) => return Ok(ExportReport::cancelled(mode, LayerCounts::default())),
        Err(err) => return Err(err),
    };
    log::info!(
        "{} of {} layer(s) visible, {} candidate(s)",
        counts.visible,
        counts.total,
        counts.candidates(config.visible_only)
    );

    let tree = match collect_layers(&descriptors, cancel, &mut *progress) {
        Ok(tree) => tree,
        Err(RunError::Cancelled) => return Ok(ExportReport::cancelled(mode, counts)),
        Err(err) => return Err(err),
    };

    let pass = LayerExporter::new(&mut *document, &mut *exporter, config, cancel, &mut *progress)
        .export_layers(&tree)?;

    if pass.cancelled {
        return Ok(ExportReport {
            exported: pass.records.len(),
            failures: pass.failures,
            records: pass.records,
            ..ExportReport::cancelled(mode, counts)
        });
    }

    let preview_path = if config.target.saves_preview() {
        Some(write_preview(&mut *document, &mut *exporter, config)?)
    } else {
        None
    };

    let manifest = manifest::synthesize(&config.target, &pass.records, document.canvas_size());
    let Emitted { manifest_path, archive_path } = manifest.emit(config, archiver)?;

    let status = if pass.failures.is_empty() {
        RunStatus::Completed
    } else {
        RunStatus::CompletedWithFailures
    };

    Ok(ExportReport {
        status,
        mode,
        counts,
        exported: pass.records.len(),
        failures: pass.failures,
        records: pass.records,
        // The vector package consumed the preview and removed the output tree.
        preview_path: preview_path.filter(|path| path.exists()),
        manifest_path,
        archive_path,
    })
}
