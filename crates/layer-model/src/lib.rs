use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

mod config;

pub use config::{
    EngineOptions, ExportConfig, FailurePolicy, FilesOptions, ImageFormat, TargetMode,
    VectorOptions,
};

/// Ratio applied when converting a text layer's point size to pixels.
pub const FONT_ASPECT_RATIO: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayerKind {
    Image,
    Group,
    SmartObject,
    Text,
    Adjustment,
    Background,
}

impl LayerKind {
    /// Leaf layers holding pixel or text data. Groups and adjustment layers are not content.
    pub fn is_content(self) -> bool {
        !matches!(self, Self::Group | Self::Adjustment)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Group => "GROUP",
            Self::SmartObject => "SMARTOBJECT",
            Self::Text => "TEXT",
            Self::Adjustment => "ADJUSTMENT",
            Self::Background => "BACKGROUND",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionMarker {
    Start,
    Content,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerHandle(pub u32);

impl LayerHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// One entry of the host's flat, bracketed layer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub handle: LayerHandle,
    pub name: String,
    pub marker: SectionMarker,
    pub visible: bool,
    pub kind: LayerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelRect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self { left: 0, top: 0, right: i64::from(width), bottom: i64::from(height) }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.left + self.right) as f64 / 2.0, (self.top + self.bottom) as f64 / 2.0)
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn to_rect(self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }
}

/// Text properties as reported by the host for a text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub contents: String,
    pub font: String,
    pub size_pt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAttributes {
    pub content: String,
    pub font: String,
    pub size_pt: f64,
    pub size_px: f64,
}

impl TextAttributes {
    pub fn from_item(item: &TextItem, dpi: f64) -> Self {
        Self {
            content: item.contents.clone(),
            font: item.font.clone(),
            size_pt: item.size_pt,
            size_px: point_size_to_px(item.size_pt, dpi),
        }
    }
}

/// `size_pt * dpi / 72 * 0.75`, rounded to two decimals.
pub fn point_size_to_px(size_pt: f64, dpi: f64) -> f64 {
    let px = size_pt * dpi / 72.0 * FONT_ASPECT_RATIO;
    (px * 100.0).round() / 100.0
}

/// Output facts of one exported layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedLayerRecord {
    /// Sanitized leaf name, also the image file stem.
    pub name: String,
    pub raw_name: String,
    /// Sanitized group names from the document root down to the layer's parent.
    pub hierarchy: Vec<String>,
    /// Bounding box in source document pixel space.
    pub bounds: PixelRect,
    pub kind: LayerKind,
    pub visible: bool,
    pub text: Option<TextAttributes>,
    /// Image location relative to the `Content` directory.
    pub image_path: PathBuf,
}

impl ExportedLayerRecord {
    pub fn hierarchy_path(&self) -> String {
        self.hierarchy.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tokens_are_upper_case() {
        let json = serde_json::to_string(&LayerKind::SmartObject).expect("kind should serialize");
        assert_eq!(json, "\"SMARTOBJECT\"");
        assert_eq!(LayerKind::Text.to_string(), "TEXT");

        let parsed: LayerKind = serde_json::from_str("\"BACKGROUND\"").expect("kind should parse");
        assert_eq!(parsed, LayerKind::Background);
    }

    #[test]
    fn groups_and_adjustments_are_not_content() {
        assert!(!LayerKind::Group.is_content());
        assert!(!LayerKind::Adjustment.is_content());
        assert!(LayerKind::Image.is_content());
        assert!(LayerKind::Text.is_content());
        assert!(LayerKind::SmartObject.is_content());
        assert!(LayerKind::Background.is_content());
    }

    #[test]
    fn rect_geometry() {
        let rect = PixelRect::new(100, 100, 140, 180);
        assert_eq!(rect.width(), 40);
        assert_eq!(rect.height(), 80);
        assert_eq!(rect.center(), (120.0, 140.0));
        assert!(!rect.is_empty());
        assert!(PixelRect::new(5, 5, 5, 20).is_empty());

        let clipped = rect.intersect(&PixelRect::from_size(120, 400));
        assert_eq!(clipped, PixelRect::new(100, 100, 120, 180));
    }

    #[test]
    fn point_size_conversion_rounds_to_two_decimals() {
        assert_eq!(point_size_to_px(12.0, 72.0), 9.0);
        assert_eq!(point_size_to_px(14.0, 300.0), 43.75);
        assert_eq!(point_size_to_px(11.3, 96.0), 11.3);
        assert_eq!(point_size_to_px(10.0, 100.0), 10.42);
    }

    #[test]
    fn hierarchy_path_joins_with_slash() {
        let record = ExportedLayerRecord {
            name: "Play".to_owned(),
            raw_name: "Play!".to_owned(),
            hierarchy: vec!["Menu".to_owned(), "Buttons".to_owned()],
            bounds: PixelRect::default(),
            kind: LayerKind::Image,
            visible: true,
            text: None,
            image_path: PathBuf::from("Menu/Buttons/Play.png"),
        };

        assert_eq!(record.hierarchy_path(), "Menu/Buttons");
    }
}
