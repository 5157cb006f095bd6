//! Fixtures shared by the unit tests.

use crate::cancel::CancellationToken;
use crate::tree::LayerTree;
use host_engine::{ArchiveError, Archiver, HostDocument, HostError, ImageExporter, MemoryDocument};
use layer_model::{
    ExportedLayerRecord, ImageFormat, LayerDescriptor, LayerHandle, LayerKind, PixelRect,
    SectionMarker, TextAttributes,
};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn descriptor(handle: u32, name: &str, visible: bool, kind: LayerKind) -> LayerDescriptor {
    LayerDescriptor {
        handle: LayerHandle(handle),
        name: name.to_owned(),
        marker: SectionMarker::Content,
        visible,
        kind,
    }
}

pub(crate) fn start(handle: u32, name: &str, visible: bool) -> LayerDescriptor {
    LayerDescriptor { marker: SectionMarker::Start, ..descriptor(handle, name, visible, LayerKind::Group) }
}

pub(crate) fn end(handle: u32) -> LayerDescriptor {
    LayerDescriptor {
        marker: SectionMarker::End,
        ..descriptor(handle, "</Layer group>", false, LayerKind::Group)
    }
}

/// Visible image record at `bounds` (`[left, top, right, bottom]`).
pub(crate) fn record(name: &str, hierarchy: &[&str], bounds: [i64; 4]) -> ExportedLayerRecord {
    let hierarchy: Vec<String> = hierarchy.iter().map(|segment| (*segment).to_owned()).collect();
    ExportedLayerRecord {
        name: name.to_owned(),
        raw_name: name.to_owned(),
        image_path: crate::manifest::files::layer_image_path(&hierarchy, name, ImageFormat::Png),
        hierarchy,
        bounds: PixelRect::new(bounds[0], bounds[1], bounds[2], bounds[3]),
        kind: LayerKind::Image,
        visible: true,
        text: None,
    }
}

pub(crate) fn text_record(name: &str, hierarchy: &[&str], content: &str, font: &str) -> ExportedLayerRecord {
    ExportedLayerRecord {
        kind: LayerKind::Text,
        text: Some(TextAttributes {
            content: content.to_owned(),
            font: font.to_owned(),
            size_pt: 24.0,
            size_px: 18.0,
        }),
        ..record(name, hierarchy, [0, 0, 100, 20])
    }
}

pub(crate) const MENU_JSON: &str = r#"{
    "name": "Menu.psd",
    "width": 200,
    "height": 100,
    "layers": [
        { "type": "group", "name": "Main Menu", "children": [
            { "type": "text", "name": "Title", "bounds": [60, 5, 140, 25],
              "text": "Main Menu", "font": "Arial-BoldMT", "size": 24 },
            { "type": "group", "name": "Buttons", "children": [
                { "type": "image", "name": "Play", "bounds": [40, 30, 80, 50] },
                { "type": "image", "name": "Quit", "bounds": [120, 30, 160, 50] }
            ] },
            { "type": "group", "name": "Options", "visible": false, "children": [
                { "type": "image", "name": "Settings", "bounds": [10, 60, 50, 90] }
            ] },
            { "type": "adjustment", "name": "Tint" }
        ] },
        { "type": "smart_object", "name": "Logo", "bounds": [0, 0, 20, 20],
          "document": { "name": "Logo", "width": 20, "height": 20, "layers": [
              { "type": "text", "name": "Caption", "bounds": [0, 10, 20, 20],
                "text": "ACME", "font": "Helvetica", "size": 8 },
              { "type": "image", "name": "Mark", "bounds": [0, 0, 20, 20] }
          ] } }
    ],
    "background": {}
}"#;

/// Five visible content layers, one hidden layer and one adjustment.
pub(crate) fn menu_document() -> MemoryDocument {
    MemoryDocument::from_json(MENU_JSON).unwrap()
}

pub(crate) fn background_document() -> MemoryDocument {
    MemoryDocument::from_json(
        r#"{ "name": "Splash Screen.psd", "width": 64, "height": 48, "background": {} }"#,
    )
    .unwrap()
}

/// Ten sibling image layers.
pub(crate) fn strip_document() -> MemoryDocument {
    let layers: Vec<String> = (0..10)
        .map(|i| {
            format!(
                r#"{{ "type": "image", "name": "Tile {i}", "bounds": [{}, 0, {}, 10] }}"#,
                i * 10,
                i * 10 + 10
            )
        })
        .collect();
    MemoryDocument::from_json(&format!(
        r#"{{ "name": "Strip", "width": 100, "height": 10, "layers": [{}] }}"#,
        layers.join(",")
    ))
    .unwrap()
}

/// Names of effectively visible content layers.
pub(crate) fn visible_content(document: &dyn HostDocument) -> Vec<String> {
    let tree = LayerTree::from_descriptors(&document.list_layers_flat().unwrap()).unwrap();
    tree.visible_content_layers()
        .map(|id| tree.node(id).name.clone())
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) struct Capture {
    pub destination: PathBuf,
    pub region: PixelRect,
    pub crop: PixelRect,
    pub visible: Vec<String>,
}

/// Writes a placeholder file per export and remembers what was visible.
#[derive(Debug, Default)]
pub(crate) struct RecordingExporter {
    pub captures: Vec<Capture>,
    /// Destinations whose file stem matches one of these fail.
    pub failing: Vec<String>,
    /// Destinations with this stem fail this many times, then succeed.
    pub flaky: Option<(String, usize)>,
    /// Calls that were rejected, retries included.
    pub rejected: usize,
    /// Cancels the token once this many exports succeeded.
    pub cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(stem: &str) -> Self {
        Self { failing: vec![stem.to_owned()], ..Self::default() }
    }

    pub fn flaky_on(stem: &str, failures: usize) -> Self {
        Self { flaky: Some((stem.to_owned(), failures)), ..Self::default() }
    }

    pub fn cancelling_after(count: usize, token: CancellationToken) -> Self {
        Self { cancel_after: Some((count, token)), ..Self::default() }
    }

    pub fn stems(&self) -> Vec<String> {
        self.captures
            .iter()
            .filter_map(|capture| capture.destination.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect()
    }
}

impl ImageExporter for RecordingExporter {
    fn export_region(
        &mut self,
        document: &dyn HostDocument,
        region: PixelRect,
        destination: &Path,
        _format: ImageFormat,
    ) -> Result<(), HostError> {
        let stem = destination
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&stem) {
            self.rejected += 1;
            return Err(HostError::Rejected(format!("cannot export {stem}")));
        }
        if let Some((flaky, remaining)) = &mut self.flaky {
            if *flaky == stem && *remaining > 0 {
                *remaining -= 1;
                self.rejected += 1;
                return Err(HostError::Rejected(format!("{stem} is busy")));
            }
        }

        fs::write(destination, stem.as_bytes())?;
        self.captures.push(Capture {
            destination: destination.to_path_buf(),
            region,
            crop: document.current_crop(),
            visible: visible_content(document),
        });

        if let Some((count, token)) = &self.cancel_after {
            if self.captures.len() == *count {
                token.cancel();
            }
        }
        Ok(())
    }
}

/// Records the staged files and writes a stand-in archive.
#[derive(Debug, Default)]
pub(crate) struct FakeArchiver {
    pub staged: Vec<PathBuf>,
    pub fail: bool,
}

impl Archiver for FakeArchiver {
    fn archive(&mut self, source_dir: &Path, destination: &Path) -> Result<(), ArchiveError> {
        if self.fail {
            return Err(ArchiveError::Failed("exit status: 12".to_owned()));
        }

        for entry in walkdir::WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| ArchiveError::Failed(err.to_string()))?;
            if entry.file_type().is_file() {
                let relative = entry.path().strip_prefix(source_dir).unwrap_or(entry.path());
                self.staged.push(relative.to_path_buf());
            }
        }
        fs::write(destination, b"PK")?;
        Ok(())
    }
}
