//! Manifest synthesis per target mode.
//!
//! [`synthesize`] dispatches once on the configured [`TargetMode`]; every
//! strategy works from the exported records and canvas size alone.

pub mod engine;
pub mod files;
pub mod vector;

use crate::error::RunResult;
use host_engine::Archiver;
use layer_model::{CanvasSize, EngineOptions, ExportConfig, ExportedLayerRecord, TargetMode, VectorOptions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Manifest {
    Files(files::FilesManifest),
    Engine { manifest: engine::EngineManifest, options: EngineOptions },
    Vector { page: vector::VectorPage, options: VectorOptions },
}

/// Where the emitted manifest and archive ended up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub manifest_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
}

pub fn synthesize(target: &TargetMode, records: &[ExportedLayerRecord], canvas: CanvasSize) -> Manifest {
    match target {
        TargetMode::Files(_) => Manifest::Files(files::plan(records)),
        TargetMode::EngineImport(options) => Manifest::Engine {
            manifest: engine::build(records, canvas),
            options: options.clone(),
        },
        TargetMode::VectorPage(options) => Manifest::Vector {
            page: vector::build(records, canvas),
            options: options.clone(),
        },
    }
}

impl Manifest {
    /// Writes the manifest, archiving the vector package if needed.
    pub fn emit(&self, config: &ExportConfig, archiver: &mut dyn Archiver) -> RunResult<Emitted> {
        match self {
            Self::Files(plan) => {
                log::debug!("flat layout with {} folder(s)", plan.folders.len());
                Ok(Emitted::default())
            }
            Self::Engine { manifest, options } => {
                let path = engine::manifest_path(&config.output_dir(), &options.manifest_extension);
                engine::write(manifest, &path)?;
                Ok(Emitted { manifest_path: Some(path), archive_path: None })
            }
            Self::Vector { page, options } => {
                let staging = vector::write_package(page, config, options)?;
                let archive = vector::finalize(archiver, &staging, config, options)?;
                Ok(Emitted { manifest_path: None, archive_path: Some(archive) })
            }
        }
    }
}

/// Pretty JSON with a four-space indent and a trailing newline.
pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value.serialize(&mut serializer)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, FakeArchiver};

    const CANVAS: CanvasSize = CanvasSize { width: 400, height: 300 };

    #[test]
    fn dispatches_on_target_mode() {
        let records = vec![record("Play", &["Menu"], [0, 0, 10, 10])];

        assert!(matches!(synthesize(&TargetMode::default(), &records, CANVAS), Manifest::Files(_)));
        assert!(matches!(
            synthesize(&TargetMode::EngineImport(EngineOptions::default()), &records, CANVAS),
            Manifest::Engine { .. }
        ));
        assert!(matches!(
            synthesize(&TargetMode::VectorPage(VectorOptions::default()), &records, CANVAS),
            Manifest::Vector { .. }
        ));
    }

    #[test]
    fn engine_manifest_honours_extension() {
        let temp = tempfile::tempdir().unwrap();
        let options = EngineOptions { manifest_extension: "txt".to_owned(), ..Default::default() };
        let config = ExportConfig { target: TargetMode::EngineImport(options), ..Default::default() }
            .with_output(temp.path(), "Menu");
        std::fs::create_dir_all(config.output_dir()).unwrap();

        let manifest = synthesize(&config.target, &[record("Play", &[], [0, 0, 4, 4])], CANVAS);
        let emitted = manifest.emit(&config, &mut FakeArchiver::default()).unwrap();

        let path = emitted.manifest_path.unwrap();
        assert_eq!(path, temp.path().join("Menu/Interface.txt"));
        assert!(path.is_file());
        assert!(emitted.archive_path.is_none());
    }

    #[test]
    fn pretty_json_indents_four_spaces() {
        let bytes = pretty_json(&serde_json::json!({ "a": [1] })).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n    \"a\": [\n        1\n    ]\n}\n");
    }
}
