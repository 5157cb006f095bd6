use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesOptions {
    pub hide_text: bool,
    pub save_preview: bool,
}

impl Default for FilesOptions {
    fn default() -> Self {
        Self { hide_text: false, save_preview: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub save_preview: bool,
    pub manifest_extension: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { save_preview: true, manifest_extension: "psdi".to_owned() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorOptions {
    pub hide_text: bool,
    /// Boilerplate files copied into the package before archiving.
    pub template_dir: Option<PathBuf>,
    pub extension: String,
}

impl Default for VectorOptions {
    fn default() -> Self {
        Self { hide_text: false, template_dir: None, extension: "sketch".to_owned() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetMode {
    Files(FilesOptions),
    EngineImport(EngineOptions),
    VectorPage(VectorOptions),
}

impl Default for TargetMode {
    fn default() -> Self {
        Self::Files(FilesOptions::default())
    }
}

impl TargetMode {
    pub fn hides_text(&self) -> bool {
        match self {
            Self::Files(options) => options.hide_text,
            Self::EngineImport(_) => false,
            Self::VectorPage(options) => options.hide_text,
        }
    }

    pub fn saves_preview(&self) -> bool {
        match self {
            Self::Files(options) => options.save_preview,
            Self::EngineImport(options) => options.save_preview,
            Self::VectorPage(_) => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Files(_) => "files",
            Self::EngineImport(_) => "engine",
            Self::VectorPage(_) => "vector",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg { quality: u8 },
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }
}

/// What to do when the host rejects a single layer's export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FailurePolicy {
    Abort,
    Skip,
    Retry { attempts: u32 },
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Skip
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub target: TargetMode,
    pub visible_only: bool,
    pub output_root: PathBuf,
    /// Output base name; the run writes into `<output_root>/<name>/`.
    pub name: String,
    pub format: ImageFormat,
    pub failure_policy: FailurePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target: TargetMode::default(),
            visible_only: true,
            output_root: PathBuf::from("."),
            name: "export".to_owned(),
            format: ImageFormat::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ExportConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(&self.name)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.output_dir().join("Content")
    }

    pub fn preview_path(&self) -> PathBuf {
        self.output_dir().join("Preview.png")
    }

    pub fn with_output(mut self, root: impl AsRef<Path>, name: impl Into<String>) -> Self {
        self.output_root = root.as_ref().to_path_buf();
        self.name = name.into();
        self
    }
}
