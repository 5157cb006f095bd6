//! Flat file layout: `Content/<group>/<group>/<leaf>.<ext>`.

use layer_model::{ExportConfig, ExportedLayerRecord, ImageFormat};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn content_dir(config: &ExportConfig) -> PathBuf {
    config.content_dir()
}

/// Image path of a layer relative to the `Content` directory.
pub fn layer_image_path(hierarchy: &[String], name: &str, format: ImageFormat) -> PathBuf {
    let mut path: PathBuf = hierarchy.iter().collect();
    path.push(format!("{name}.{}", format.extension()));
    path
}

/// Creates the directory a layer's image goes into. Safe to call repeatedly.
pub fn ensure_layer_dirs(content_dir: &Path, hierarchy: &[String]) -> io::Result<PathBuf> {
    let dir = hierarchy.iter().fold(content_dir.to_path_buf(), |dir, segment| dir.join(segment));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Folder guide for the flat layout: every directory and image the run wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilesManifest {
    pub folders: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
}

pub fn plan(records: &[ExportedLayerRecord]) -> FilesManifest {
    let mut folders = BTreeSet::new();
    for record in records {
        let mut folder = PathBuf::new();
        for segment in &record.hierarchy {
            folder.push(segment);
            folders.insert(folder.clone());
        }
    }

    FilesManifest {
        folders: folders.into_iter().collect(),
        images: records.iter().map(|record| record.image_path.clone()).collect(),
    }
}
