//! Layered export configuration: stored defaults, then a `--config` file,
//! then command-line flags.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use layer_model::{
    EngineOptions, ExportConfig, FailurePolicy, FilesOptions, ImageFormat, TargetMode,
    VectorOptions,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_JPEG_QUALITY: u8 = 90;
const DEFAULT_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Files,
    Engine,
    Vector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Abort,
    Skip,
    Retry,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExportFlags {
    /// Target layout.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Directory the export folder (or archive) is created in.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Output base name. Defaults to the document name.
    #[arg(long)]
    pub name: Option<String>,
    /// Export hidden layers too.
    #[arg(long)]
    pub all: bool,
    /// Hide text layers before exporting (files and vector modes).
    #[arg(long)]
    pub hide_text: bool,
    /// Skip Preview.png (files and engine modes).
    #[arg(long)]
    pub no_preview: bool,
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
    /// JPEG quality, 1 to 100.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,
    /// What to do when a single layer fails to export.
    #[arg(long, value_enum)]
    pub on_error: Option<PolicyArg>,
    /// Extra attempts with `--on-error retry`.
    #[arg(long)]
    pub retries: Option<u32>,
    /// Files copied into the vector package.
    #[arg(long, value_name = "DIR")]
    pub template: Option<PathBuf>,
    /// Extension of the engine manifest file.
    #[arg(long, value_name = "EXT")]
    pub manifest_ext: Option<String>,
    /// JSON file with export settings, layered over the stored defaults.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Recursively overlays `overlay` onto `base`. Objects merge key by key;
/// everything else is replaced.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

pub fn layer_config_file(stored: &ExportConfig, path: &Path) -> Result<ExportConfig> {
    let bytes = fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let overlay: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("config {} is not valid JSON", path.display()))?;

    let mut merged = serde_json::to_value(stored)?;
    // A different target mode replaces the stored options wholesale.
    if let (Some(new_mode), Some(target)) = (overlay.pointer("/target/mode"), merged.get_mut("target")) {
        if target.get("mode") != Some(new_mode) {
            *target = Value::Object(Default::default());
        }
    }
    merge_json(&mut merged, overlay);

    serde_json::from_value(merged).with_context(|| format!("invalid export config in {}", path.display()))
}

fn switch_mode(target: &TargetMode, mode: ModeArg) -> TargetMode {
    match (target, mode) {
        (TargetMode::Files(_), ModeArg::Files)
        | (TargetMode::EngineImport(_), ModeArg::Engine)
        | (TargetMode::VectorPage(_), ModeArg::Vector) => target.clone(),
        (_, ModeArg::Files) => TargetMode::Files(FilesOptions::default()),
        (_, ModeArg::Engine) => TargetMode::EngineImport(EngineOptions::default()),
        (_, ModeArg::Vector) => TargetMode::VectorPage(VectorOptions::default()),
    }
}

impl ExportFlags {
    /// Stored config, then `--config`, then the individual flags.
    pub fn resolve(&self, stored: ExportConfig) -> Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => layer_config_file(&stored, path)?,
            None => stored,
        };

        if let Some(mode) = self.mode {
            config.target = switch_mode(&config.target, mode);
        }
        if let Some(out) = &self.out {
            config.output_root = out.clone();
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if self.all {
            config.visible_only = false;
        }

        match &mut config.target {
            TargetMode::Files(options) => {
                options.hide_text |= self.hide_text;
                options.save_preview &= !self.no_preview;
            }
            TargetMode::EngineImport(options) => {
                if self.hide_text {
                    log::warn!("--hide-text has no effect in engine mode");
                }
                options.save_preview &= !self.no_preview;
                if let Some(extension) = &self.manifest_ext {
                    options.manifest_extension = extension.trim_start_matches('.').to_owned();
                }
            }
            TargetMode::VectorPage(options) => {
                options.hide_text |= self.hide_text;
                if self.template.is_some() {
                    options.template_dir = self.template.clone();
                }
            }
        }

        match (self.format, self.quality) {
            (Some(FormatArg::Png), _) => config.format = ImageFormat::Png,
            (Some(FormatArg::Jpeg), quality) => {
                config.format = ImageFormat::Jpeg { quality: quality.unwrap_or(DEFAULT_JPEG_QUALITY) }
            }
            (None, Some(quality)) => {
                if let ImageFormat::Jpeg { quality: current } = &mut config.format {
                    *current = quality;
                }
            }
            (None, None) => {}
        }

        match self.on_error {
            Some(PolicyArg::Abort) => config.failure_policy = FailurePolicy::Abort,
            Some(PolicyArg::Skip) => config.failure_policy = FailurePolicy::Skip,
            Some(PolicyArg::Retry) => {
                config.failure_policy =
                    FailurePolicy::Retry { attempts: self.retries.unwrap_or(DEFAULT_RETRIES) }
            }
            None => {
                if let (Some(retries), FailurePolicy::Retry { attempts }) =
                    (self.retries, &mut config.failure_policy)
                {
                    *attempts = retries;
                }
            }
        }

        Ok(config)
    }
}
