//! Engine-import manifest: one JSON document describing every exported
//! layer in engine coordinates.
//!
//! Positions are measured from the canvas center to the layer's pivot (its
//! bounds center), with Y pointing up.

use layer_model::{CanvasSize, ExportedLayerRecord, LayerKind, PixelRect};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_STEM: &str = "Interface";
pub const MANIFEST_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineManifest {
    pub canvas: CanvasInfo,
    pub version: String,
    pub layers: Vec<EngineLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineLayer {
    pub name: String,
    pub file_name: String,
    /// Upper-case kind token such as `IMAGE` or `TEXT`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sanitized group path joined with `/`, empty at the document root.
    #[serde(default)]
    pub hierarchy: String,
    pub transform_params: TransformParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_params: Option<TextParams>,
}

impl EngineLayer {
    pub fn is_text(&self) -> bool {
        self.kind.eq_ignore_ascii_case(LayerKind::Text.as_str())
    }

    /// Group names from the root down, skipping empty segments.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.hierarchy.split('/').filter(|segment| !segment.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParams {
    pub pos_x: i64,
    pub pos_y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    pub text: String,
    pub font: String,
    /// Pixel size.
    pub size: f64,
}

/// Rounds halves toward positive infinity.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

pub fn engine_transform(bounds: &PixelRect, canvas: CanvasSize) -> TransformParams {
    let center_x = round_half_up(f64::from(canvas.width) / 2.0);
    let center_y = round_half_up(f64::from(canvas.height) / 2.0);
    let (pivot_x, pivot_y) = bounds.center();

    TransformParams {
        pos_x: round_half_up(pivot_x) - center_x,
        pos_y: center_y - round_half_up(pivot_y),
        width: bounds.width(),
        height: bounds.height(),
    }
}

pub fn build(records: &[ExportedLayerRecord], canvas: CanvasSize) -> EngineManifest {
    let layers = records
        .iter()
        .map(|record| EngineLayer {
            name: record.raw_name.clone(),
            file_name: record.name.clone(),
            kind: record.kind.as_str().to_owned(),
            hierarchy: record.hierarchy_path(),
            transform_params: engine_transform(&record.bounds, canvas),
            text_params: record
                .text
                .as_ref()
                .filter(|_| record.kind == LayerKind::Text)
                .map(|text| TextParams {
                    text: text.content.clone(),
                    font: text.font.clone(),
                    size: text.size_px,
                }),
        })
        .collect();

    EngineManifest {
        canvas: CanvasInfo { width: canvas.width, height: canvas.height },
        version: MANIFEST_VERSION.to_owned(),
        layers,
    }
}

pub fn manifest_path(output_dir: &Path, extension: &str) -> PathBuf {
    output_dir.join(format!("{MANIFEST_STEM}.{extension}"))
}

pub fn to_json(manifest: &EngineManifest) -> serde_json::Result<Vec<u8>> {
    super::pretty_json(manifest)
}

pub fn write(manifest: &EngineManifest, path: &Path) -> crate::RunResult<()> {
    fs::write(path, to_json(manifest)?)?;
    log::info!("wrote engine manifest with {} layer(s) to {}", manifest.layers.len(), path.display());
    Ok(())
}

pub fn read(path: &Path) -> Result<EngineManifest, crate::ImportError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, text_record};

    const CANVAS: CanvasSize = CanvasSize { width: 400, height: 300 };

    #[test]
    fn transform_is_centered_with_y_up() {
        let params = engine_transform(&PixelRect::new(100, 100, 140, 180), CANVAS);
        assert_eq!(params, TransformParams { pos_x: -80, pos_y: 10, width: 40, height: 80 });
    }

    #[test]
    fn transform_rounds_odd_sizes_up() {
        let canvas = CanvasSize { width: 101, height: 51 };
        let params = engine_transform(&PixelRect::new(0, 0, 3, 3), canvas);
        // center (51, 26), pivot (2, 2)
        assert_eq!((params.pos_x, params.pos_y), (-49, 24));
    }

    #[test]
    fn text_params_only_for_text_layers() {
        let records = vec![
            text_record("Title", &["Menu"], "Start Game", "Arial-BoldMT"),
            record("Play", &["Menu", "Buttons"], [100, 100, 140, 180]),
        ];

        let manifest = build(&records, CANVAS);

        assert_eq!(manifest.layers[0].kind, "TEXT");
        assert_eq!(manifest.layers[0].hierarchy, "Menu");
        let text = manifest.layers[0].text_params.as_ref().unwrap();
        assert_eq!((text.text.as_str(), text.size), ("Start Game", 18.0));

        assert_eq!(manifest.layers[1].hierarchy, "Menu/Buttons");
        assert!(manifest.layers[1].text_params.is_none());
        assert_eq!(manifest.version, MANIFEST_VERSION);
    }

    #[test]
    fn layer_name_is_raw_and_file_name_is_sanitized() {
        let record = ExportedLayerRecord {
            name: "PlayButton".to_owned(),
            raw_name: "Play Button".to_owned(),
            ..record("PlayButton", &["Menu"], [0, 0, 10, 10])
        };

        let manifest = build(&[record], CANVAS);

        assert_eq!(manifest.layers[0].name, "Play Button");
        assert_eq!(manifest.layers[0].file_name, "PlayButton");
    }

    #[test]
    fn json_uses_four_space_indent() {
        let manifest = build(&[record("Play", &[], [0, 0, 10, 10])], CANVAS);
        let json = String::from_utf8(to_json(&manifest).unwrap()).unwrap();

        assert!(json.starts_with("{\n    \"canvas\": {\n        \"width\": 400,"));
        assert!(json.contains("\"fileName\": \"Play\""));
        assert!(json.contains("\"transformParams\""));
        assert!(!json.contains("textParams"));
        assert!(json.ends_with("}\n"));
    }

    #[test]
    fn written_manifest_reads_back() {
        let temp = tempfile::tempdir().unwrap();
        let path = manifest_path(temp.path(), "json");
        let manifest = build(
            &[
                text_record("Title", &[], "Hi", "Arial"),
                record("Play", &["Menu"], [0, 0, 10, 10]),
            ],
            CANVAS,
        );

        write(&manifest, &path).unwrap();

        assert_eq!(path.file_name().unwrap(), "Interface.json");
        assert_eq!(read(&path).unwrap(), manifest);
    }

    #[test]
    fn lower_case_kind_is_still_text() {
        let layer: EngineLayer = serde_json::from_str(
            r#"{ "name": "T", "fileName": "T", "type": "text",
                 "transformParams": { "posX": 0, "posY": 0, "width": 1, "height": 1 } }"#,
        )
        .unwrap();
        assert!(layer.is_text());
        assert_eq!(layer.groups().count(), 0);
    }
}
