// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Blattwerk document operations.
//
// Geometry handed in by callers uses a top-left origin with y growing
// downward (device space). The document crate converts to PDF user space.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BlattwerkError;

/// An RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const YELLOW: Rgb = Rgb::new(1.0, 1.0, 0.0);
    pub const GREEN: Rgb = Rgb::new(0.0, 1.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` (or `RRGGBB`) hex colour.
    pub fn from_hex(hex: &str) -> Result<Self, BlattwerkError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(BlattwerkError::Parse(format!(
                "colour must be #RRGGBB, got {hex:?}"
            )));
        }
        let channel = |range: std::ops::Range<usize>| -> Result<f32, BlattwerkError> {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| BlattwerkError::Parse(format!("invalid hex colour {hex:?}")))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Format as `#rrggbb`.
    pub fn to_hex(&self) -> String {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            to_byte(self.r),
            to_byte(self.g),
            to_byte(self.b)
        )
    }

    /// Components as an array, in PDF operand order.
    pub fn components(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

impl TryFrom<String> for Rgb {
    type Error = BlattwerkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// A point in device space (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in device space (top-left origin).
///
/// `x0 <= x1` and `y0 <= y1` always hold; constructors normalise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// US Letter, used when a page carries no usable MediaBox.
    pub const LETTER: PageSize = PageSize::new(612.0, 792.0);
}

/// Margin used by text stamps on both axes.
pub const STAMP_MARGIN: f32 = 50.0;
/// Horizontal margin used by page numbers.
pub const NUMBER_MARGIN_X: f32 = 50.0;
/// Vertical margin used by page numbers.
pub const NUMBER_MARGIN_Y: f32 = 30.0;

/// Anchor for text stamps. Unknown names fall back to [`StampPosition::Center`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StampPosition {
    #[default]
    Center,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl StampPosition {
    pub fn from_name(name: &str) -> Self {
        match name {
            "center" => Self::Center,
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            _ => Self::Center,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }

    /// Baseline-centre point for a stamp on a page of the given size.
    pub fn anchor(&self, page: PageSize) -> Point {
        let (w, h, m) = (page.width, page.height, STAMP_MARGIN);
        match self {
            Self::Center => Point::new(w / 2.0, h / 2.0),
            Self::Top => Point::new(w / 2.0, m),
            Self::Bottom => Point::new(w / 2.0, h - m),
            Self::TopLeft => Point::new(m, m),
            Self::TopRight => Point::new(w - m, m),
            Self::BottomLeft => Point::new(m, h - m),
            Self::BottomRight => Point::new(w - m, h - m),
        }
    }
}

impl From<String> for StampPosition {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<StampPosition> for String {
    fn from(position: StampPosition) -> Self {
        position.name().to_string()
    }
}

/// Anchor for page numbers. Unknown names fall back to
/// [`NumberPosition::BottomRight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NumberPosition {
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
    TopLeft,
    TopCenter,
    TopRight,
}

impl NumberPosition {
    pub fn from_name(name: &str) -> Self {
        match name {
            "bottom-left" => Self::BottomLeft,
            "bottom-center" => Self::BottomCenter,
            "bottom-right" => Self::BottomRight,
            "top-left" => Self::TopLeft,
            "top-center" => Self::TopCenter,
            "top-right" => Self::TopRight,
            _ => Self::BottomRight,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
        }
    }

    pub fn anchor(&self, page: PageSize) -> Point {
        let (w, h) = (page.width, page.height);
        let (mx, my) = (NUMBER_MARGIN_X, NUMBER_MARGIN_Y);
        match self {
            Self::BottomLeft => Point::new(mx, h - my),
            Self::BottomCenter => Point::new(w / 2.0, h - my),
            Self::BottomRight => Point::new(w - mx, h - my),
            Self::TopLeft => Point::new(mx, my),
            Self::TopCenter => Point::new(w / 2.0, my),
            Self::TopRight => Point::new(w - mx, my),
        }
    }
}

impl From<String> for NumberPosition {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<NumberPosition> for String {
    fn from(position: NumberPosition) -> Self {
        position.name().to_string()
    }
}

fn first_page() -> u32 {
    1
}

fn default_text_size() -> f32 {
    20.0
}

fn default_stroke_width() -> f32 {
    2.0
}

/// One entry of a batch annotation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Annotation {
    /// Text with its baseline starting at `(x, y)`.
    Text {
        #[serde(default = "first_page")]
        page: u32,
        x: f32,
        y: f32,
        content: String,
        #[serde(default)]
        color: Rgb,
        #[serde(default = "default_text_size")]
        size: f32,
    },
    /// Stroked rectangle outline.
    Rect {
        #[serde(default = "first_page")]
        page: u32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        #[serde(default)]
        color: Rgb,
        #[serde(default = "default_stroke_width")]
        width: f32,
    },
    /// Raster image fitted into the rectangle.
    Image {
        #[serde(default = "first_page")]
        page: u32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        image_path: PathBuf,
    },
}

impl Annotation {
    /// 1-based target page.
    pub fn page(&self) -> u32 {
        match self {
            Self::Text { page, .. } | Self::Rect { page, .. } | Self::Image { page, .. } => *page,
        }
    }
}

/// Outcome of a batch annotation: which entries were applied and which
/// were skipped (with the reason), by index into the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationReport {
    pub applied: Vec<usize>,
    pub skipped: Vec<(usize, String)>,
}

impl AnnotationReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// A page-targeted text replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChange {
    pub page: u32,
    pub old_text: String,
    pub new_text: String,
}

/// Office formats produced by the external converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfficeFormat {
    Docx,
    Pptx,
}

impl OfficeFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }

    /// LibreOffice import filter that opens a PDF in the matching module.
    pub fn import_filter(&self) -> &'static str {
        match self {
            Self::Docx => "writer_pdf_import",
            Self::Pptx => "impress_pdf_import",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_anchor_bottom_right() {
        let page = PageSize::new(600.0, 800.0);
        assert_eq!(NumberPosition::BottomRight.anchor(page), Point::new(550.0, 770.0));
    }

    #[test]
    fn page_number_anchor_top_left() {
        let page = PageSize::new(600.0, 800.0);
        assert_eq!(NumberPosition::TopLeft.anchor(page), Point::new(50.0, 30.0));
    }

    #[test]
    fn unknown_anchor_names_fall_back() {
        assert_eq!(StampPosition::from_name("middle"), StampPosition::Center);
        assert_eq!(NumberPosition::from_name("left"), NumberPosition::BottomRight);
        assert_eq!(NumberPosition::from_name("top-center"), NumberPosition::TopCenter);
    }

    #[test]
    fn positions_deserialize_leniently() {
        let stamp: StampPosition = serde_json::from_str(r#""top-left""#).unwrap();
        assert_eq!(stamp, StampPosition::TopLeft);
        let stamp: StampPosition = serde_json::from_str(r#""middle""#).unwrap();
        assert_eq!(stamp, StampPosition::Center);
        let number: NumberPosition = serde_json::from_str(r#""sideways""#).unwrap();
        assert_eq!(number, NumberPosition::BottomRight);
        assert_eq!(
            serde_json::to_string(&NumberPosition::TopCenter).unwrap(),
            r#""top-center""#
        );
    }

    #[test]
    fn stamp_anchors_use_fifty_point_margins() {
        let page = PageSize::new(600.0, 800.0);
        assert_eq!(StampPosition::Center.anchor(page), Point::new(300.0, 400.0));
        assert_eq!(StampPosition::Top.anchor(page), Point::new(300.0, 50.0));
        assert_eq!(StampPosition::BottomLeft.anchor(page), Point::new(50.0, 750.0));
        assert_eq!(StampPosition::TopRight.anchor(page), Point::new(550.0, 50.0));
    }

    #[test]
    fn hex_colour_parsing() {
        let red = Rgb::from_hex("#FF0000").unwrap();
        assert_eq!(red, Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(Rgb::from_hex("00ff00").unwrap(), Rgb::GREEN);
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("#zzzzzz").is_err());
        assert_eq!(red.to_hex(), "#ff0000");
    }

    #[test]
    fn rect_normalises_and_intersects() {
        let r = Rect::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(r, Rect::new(0.0, 5.0, 10.0, 20.0));
        assert!(r.intersects(&Rect::new(5.0, 5.0, 15.0, 10.0)));
        assert!(!r.intersects(&Rect::new(11.0, 5.0, 15.0, 10.0)));
        assert!(r.contains(r.center()));
    }

    #[test]
    fn annotations_deserialize_from_json() {
        let json = r##"[
            {"type": "text", "x": 10, "y": 20, "content": "hi", "color": "#ff0000"},
            {"type": "rect", "page": 2, "x1": 0, "y1": 0, "x2": 5, "y2": 5},
            {"type": "image", "x1": 0, "y1": 0, "x2": 5, "y2": 5, "image_path": "logo.png"}
        ]"##;
        let parsed: Vec<Annotation> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 3);
        match &parsed[0] {
            Annotation::Text { page, size, color, .. } => {
                assert_eq!(*page, 1);
                assert_eq!(*size, 20.0);
                assert_eq!(*color, Rgb::new(1.0, 0.0, 0.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &parsed[1] {
            Annotation::Rect { width, color, .. } => {
                assert_eq!(*width, 2.0);
                assert_eq!(*color, Rgb::BLACK);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parsed[1].page(), 2);
    }
}
