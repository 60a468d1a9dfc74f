// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay placement: text, rectangles, and images painted on top of existing
// pages, plus the stamp, page-number, watermark, and batch-annotate
// operations built from them.

use std::path::Path;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::{
    Annotation, AnnotationReport, NumberPosition, Point, Rect, Rgb, StampPosition,
};
use lopdf::content::Operation;
use lopdf::{Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::document::PdfDocument;
use super::fonts::{encode_win_ansi, helvetica_text_width};
use super::writer::image_xobject;

/// Horizontal placement of inserted text relative to its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

fn stamp_font_size() -> f32 {
    20.0
}

fn number_font_size() -> f32 {
    12.0
}

fn first_label() -> u32 {
    1
}

/// Parameters of a text stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampOptions {
    pub text: String,
    #[serde(default)]
    pub position: StampPosition,
    #[serde(default = "stamp_font_size")]
    pub font_size: f32,
    #[serde(default)]
    pub color: Rgb,
    /// Restrict the stamp to one 1-based page.
    #[serde(default)]
    pub page: Option<u32>,
}

impl StampOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: StampPosition::default(),
            font_size: stamp_font_size(),
            color: Rgb::BLACK,
            page: None,
        }
    }
}

/// Parameters of page numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNumberOptions {
    /// Label printed on the first page.
    #[serde(default = "first_label")]
    pub start_page: u32,
    #[serde(default)]
    pub position: NumberPosition,
    #[serde(default = "number_font_size")]
    pub font_size: f32,
    #[serde(default)]
    pub color: Rgb,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            start_page: first_label(),
            position: NumberPosition::default(),
            font_size: number_font_size(),
            color: Rgb::BLACK,
        }
    }
}

/// Parameters of the diagonal watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub font_size: f32,
    pub opacity: f32,
    pub angle_degrees: f32,
    pub color: Rgb,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            font_size: 40.0,
            opacity: 0.3,
            angle_degrees: 45.0,
            color: Rgb::BLACK,
        }
    }
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn fill_color(color: Rgb) -> Operation {
    Operation::new("rg", color.components().iter().copied().map(real).collect())
}

fn stroke_color(color: Rgb) -> Operation {
    Operation::new("RG", color.components().iter().copied().map(real).collect())
}

impl PdfDocument {
    // -- Primitives -----------------------------------------------------------

    /// Insert Helvetica text on a 1-based page. `anchor` is in caller space
    /// and marks the baseline start (`Left`) or baseline centre (`Center`).
    pub fn insert_text(
        &mut self,
        page: u32,
        anchor: Point,
        text: &str,
        size: f32,
        color: Rgb,
        align: TextAlign,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        self.insert_text_on(page_id, anchor, text, size, color, align)
    }

    pub(crate) fn insert_text_on(
        &mut self,
        page_id: ObjectId,
        anchor: Point,
        text: &str,
        size: f32,
        color: Rgb,
        align: TextAlign,
    ) -> Result<()> {
        let font = self.helvetica_font(page_id)?;
        let (mut x, y) = self.geometry(page_id).to_user(anchor);
        if align == TextAlign::Center {
            x -= helvetica_text_width(text, size) / 2.0;
        }

        let operations = vec![
            Operation::new("q", vec![]),
            fill_color(color),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font), real(size)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        self.append_content(page_id, operations)
    }

    /// Stroke a rectangle outline on a 1-based page.
    pub fn draw_rect(&mut self, page: u32, rect: Rect, color: Rgb, width: f32) -> Result<()> {
        let page_id = self.page_id(page)?;
        let [x0, y0, x1, y1] = self.geometry(page_id).rect_to_user(rect);
        let operations = vec![
            Operation::new("q", vec![]),
            stroke_color(color),
            Operation::new("w", vec![real(width)]),
            Operation::new("re", vec![real(x0), real(y0), real(x1 - x0), real(y1 - y0)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ];
        self.append_content(page_id, operations)
    }

    /// Place an image file inside `rect` on a 1-based page, keeping its aspect
    /// ratio and centring it in the rectangle.
    pub fn insert_image(&mut self, page: u32, rect: Rect, image_path: &Path) -> Result<()> {
        let page_id = self.page_id(page)?;
        let image = ::image::open(image_path).map_err(|err| {
            BlattwerkError::ImageError(format!("failed to open {}: {}", image_path.display(), err))
        })?;
        if rect.is_empty() {
            return Err(BlattwerkError::Parse(format!("image rectangle {:?} is empty", rect)));
        }

        let (img_w, img_h) = (image.width() as f32, image.height() as f32);
        let scale = (rect.width() / img_w).min(rect.height() / img_h);
        let (draw_w, draw_h) = (img_w * scale, img_h * scale);
        let left = rect.x0 + (rect.width() - draw_w) / 2.0;
        let top = rect.y0 + (rect.height() - draw_h) / 2.0;
        let placed = Rect::new(left, top, left + draw_w, top + draw_h);
        let [x0, y0, _, _] = self.geometry(page_id).rect_to_user(placed);

        let image_id = image_xobject(self, &image)?;
        let name = self.add_xobject(page_id, image_id)?;
        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![real(draw_w), real(0.0), real(0.0), real(draw_h), real(x0), real(y0)],
            ),
            Operation::new("Do", vec![Object::Name(name)]),
            Operation::new("Q", vec![]),
        ];
        debug!(?placed, "Image placed");
        self.append_content(page_id, operations)
    }

    // -- Operations -----------------------------------------------------------

    /// Stamp centred text on every page, or on `options.page` only. An
    /// out-of-range page leaves the document unchanged.
    #[instrument(skip(self, options), fields(text = %options.text))]
    pub fn add_text_stamp(&mut self, options: &StampOptions) -> Result<()> {
        let targets: Vec<ObjectId> = match options.page {
            Some(page) => match self.page_id(page) {
                Ok(id) => vec![id],
                Err(_) => {
                    warn!(page, page_count = self.page_count(), "Stamp page out of range, skipping");
                    return Ok(());
                }
            },
            None => self.page_ids(),
        };

        for page_id in targets {
            let anchor = options.position.anchor(self.geometry(page_id).size());
            self.insert_text_on(
                page_id,
                anchor,
                &options.text,
                options.font_size,
                options.color,
                TextAlign::Center,
            )?;
        }
        info!(position = ?options.position, "Text stamp applied");
        Ok(())
    }

    /// Number every page with `start_page + i`.
    #[instrument(skip(self, options), fields(start = options.start_page))]
    pub fn add_page_numbers(&mut self, options: &PageNumberOptions) -> Result<()> {
        for (i, page_id) in self.page_ids().into_iter().enumerate() {
            let label = (options.start_page as u64 + i as u64).to_string();
            let anchor = options.position.anchor(self.geometry(page_id).size());
            self.insert_text_on(
                page_id,
                anchor,
                &label,
                options.font_size,
                options.color,
                TextAlign::Center,
            )?;
        }
        info!(pages = self.page_count(), "Page numbers added");
        Ok(())
    }

    /// Semi-transparent diagonal text centred on every page.
    #[instrument(skip(self, options))]
    pub fn add_watermark(&mut self, text: &str, options: &WatermarkOptions) -> Result<()> {
        let (sin, cos) = options.angle_degrees.to_radians().sin_cos();
        let half_width = helvetica_text_width(text, options.font_size) / 2.0;

        for page_id in self.page_ids() {
            let geometry = self.geometry(page_id);
            let font = self.helvetica_font(page_id)?;
            let state = self.alpha_state(page_id, options.opacity)?;
            let cx = (geometry.x0 + geometry.x1) / 2.0;
            let cy = (geometry.y0 + geometry.y1) / 2.0;

            let operations = vec![
                Operation::new("q", vec![]),
                Operation::new("gs", vec![Object::Name(state)]),
                fill_color(options.color),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font), real(options.font_size)]),
                Operation::new(
                    "Tm",
                    vec![real(cos), real(sin), real(-sin), real(cos), real(cx), real(cy)],
                ),
                Operation::new("Td", vec![real(-half_width), real(0.0)]),
                Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ];
            self.append_content(page_id, operations)?;
        }
        info!(pages = self.page_count(), "Watermark applied");
        Ok(())
    }

    /// Apply a batch of annotations. Each failure is logged and recorded in
    /// the report; the rest of the batch still runs.
    #[instrument(skip_all, fields(count = annotations.len()))]
    pub fn annotate(&mut self, annotations: &[Annotation]) -> AnnotationReport {
        let mut report = AnnotationReport::default();
        for (index, annotation) in annotations.iter().enumerate() {
            match self.apply_annotation(annotation) {
                Ok(()) => report.applied.push(index),
                Err(err) => {
                    warn!(index, page = annotation.page(), %err, "Annotation skipped");
                    report.skipped.push((index, err.to_string()));
                }
            }
        }
        info!(applied = report.applied.len(), skipped = report.skipped.len(), "Annotations processed");
        report
    }

    fn apply_annotation(&mut self, annotation: &Annotation) -> Result<()> {
        match annotation {
            Annotation::Text { page, x, y, content, color, size } => {
                self.insert_text(*page, Point::new(*x, *y), content, *size, *color, TextAlign::Left)
            }
            Annotation::Rect { page, x1, y1, x2, y2, color, width } => {
                self.draw_rect(*page, Rect::new(*x1, *y1, *x2, *y2), *color, *width)
            }
            Annotation::Image { page, x1, y1, x2, y2, image_path } => {
                self.insert_image(*page, Rect::new(*x1, *y1, *x2, *y2), image_path)
            }
        }
    }
}

/// `q r g b rg x y w h re f Q` for a user-space box.
pub(crate) fn fill_rect_ops(user_rect: [f32; 4], color: Rgb) -> Vec<Operation> {
    let [x0, y0, x1, y1] = user_rect;
    vec![
        Operation::new("q", vec![]),
        fill_color(color),
        Operation::new("re", vec![real(x0), real(y0), real(x1 - x0), real(y1 - y0)]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::text_pdf;
    use lopdf::content::Content;

    fn ops_of(doc: &PdfDocument, page: u32) -> Vec<Operation> {
        let page_id = doc.page_id(page).unwrap();
        doc.page_content(page_id).unwrap().operations
    }

    fn td_of(ops: &[Operation]) -> (f32, f32) {
        let td = ops.iter().rev().find(|op| op.operator == "Td").unwrap();
        (
            td.operands[0].as_float().unwrap(),
            td.operands[1].as_float().unwrap(),
        )
    }

    #[test]
    fn options_accept_unknown_positions() {
        let stamp: StampOptions =
            serde_json::from_str(r#"{"text": "DRAFT", "position": "middle"}"#).unwrap();
        assert_eq!(stamp.position, StampPosition::Center);
        assert_eq!(stamp.font_size, 20.0);

        let numbers: PageNumberOptions =
            serde_json::from_str(r#"{"position": "top-left"}"#).unwrap();
        assert_eq!(numbers.position, NumberPosition::TopLeft);
        let numbers: PageNumberOptions = serde_json::from_str(r#"{"position": "nowhere"}"#).unwrap();
        assert_eq!(numbers.position, NumberPosition::BottomRight);
    }

    #[test]
    fn page_numbers_sit_at_the_bottom_right_anchor() {
        let mut doc = text_pdf(&[&["a"], &["b"]]);
        doc.add_page_numbers(&PageNumberOptions { start_page: 5, ..Default::default() }).unwrap();

        assert!(doc.page_text(1).unwrap().contains('5'));
        assert!(doc.page_text(2).unwrap().contains('6'));

        // "5" is 556/1000 em wide at 12pt; centred on x=562, baseline y=30.
        let (x, y) = td_of(&ops_of(&doc, 1));
        assert!((x - (562.0 - 0.556 * 6.0)).abs() < 1e-3);
        assert!((y - 30.0).abs() < 1e-3);
    }

    #[test]
    fn stamp_on_single_page_and_out_of_range() {
        let mut doc = text_pdf(&[&["a"], &["b"]]);
        let mut options = StampOptions::new("DRAFT");
        options.page = Some(2);
        doc.add_text_stamp(&options).unwrap();
        assert!(!doc.page_text(1).unwrap().contains("DRAFT"));
        assert!(doc.page_text(2).unwrap().contains("DRAFT"));

        options.page = Some(7);
        let before = ops_of(&doc, 1).len();
        doc.add_text_stamp(&options).unwrap();
        assert_eq!(ops_of(&doc, 1).len(), before);
    }

    #[test]
    fn stamped_text_is_searchable_where_it_was_placed() {
        let mut doc = text_pdf(&[&[]]);
        let mut options = StampOptions::new("APPROVED");
        options.position = StampPosition::TopLeft;
        doc.add_text_stamp(&options).unwrap();
        let hits = doc.search_for(1, "APPROVED").unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].center().x - 50.0).abs() < 0.5);
    }

    #[test]
    fn watermark_is_rotated_and_translucent() {
        let mut doc = text_pdf(&[&["body"]]);
        doc.add_watermark("CONFIDENTIAL", &WatermarkOptions::default()).unwrap();
        let ops = ops_of(&doc, 1);
        let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
        let a = tm.operands[0].as_float().unwrap();
        assert!((a - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
        assert_eq!(tm.operands[4].as_float().unwrap(), 306.0);
        assert!(ops.iter().any(|op| op.operator == "gs"));
        assert!(doc.page_text(1).unwrap().contains("CONFIDENTIAL"));
    }

    #[test]
    fn annotate_reports_partial_failures() {
        let mut doc = text_pdf(&[&["x"]]);
        let batch = vec![
            Annotation::Text {
                page: 1,
                x: 10.0,
                y: 20.0,
                content: "note".into(),
                color: Rgb::new(1.0, 0.0, 0.0),
                size: 20.0,
            },
            Annotation::Rect {
                page: 3,
                x1: 0.0,
                y1: 0.0,
                x2: 5.0,
                y2: 5.0,
                color: Rgb::BLACK,
                width: 2.0,
            },
            Annotation::Image {
                page: 1,
                x1: 0.0,
                y1: 0.0,
                x2: 5.0,
                y2: 5.0,
                image_path: "/nonexistent/logo.png".into(),
            },
            Annotation::Rect {
                page: 1,
                x1: 10.0,
                y1: 10.0,
                x2: 50.0,
                y2: 30.0,
                color: Rgb::BLACK,
                width: 2.0,
            },
        ];
        let report = doc.annotate(&batch);
        assert_eq!(report.applied, vec![0, 3]);
        assert_eq!(report.skipped.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
        assert!(doc.page_text(1).unwrap().contains("note"));
        let ops = ops_of(&doc, 1);
        let re = ops.iter().find(|op| op.operator == "re").unwrap();
        // Top-left (10,10) .. (50,30) -> user y from 762 to 782.
        assert_eq!(re.operands[1].as_float().unwrap(), 762.0);
        assert_eq!(re.operands[3].as_float().unwrap(), 20.0);
    }

    #[test]
    fn image_keeps_aspect_ratio_inside_rect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        image::DynamicImage::new_rgba8(40, 20).save(&path).unwrap();

        let mut doc = text_pdf(&[&[]]);
        doc.insert_image(1, Rect::new(0.0, 0.0, 100.0, 100.0), &path).unwrap();
        let ops = ops_of(&doc, 1);
        let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
        let values: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
        // 100x50 centred vertically: top at 25 -> bottom edge at 792 - 75.
        assert_eq!(values, vec![100.0, 0.0, 0.0, 50.0, 0.0, 717.0]);
    }

    #[test]
    fn fill_rect_ops_are_balanced() {
        let ops = fill_rect_ops([0.0, 0.0, 10.0, 10.0], Rgb::BLACK);
        let content = Content { operations: ops };
        let encoded = String::from_utf8(content.encode().unwrap()).unwrap();
        assert!(encoded.starts_with("q"));
        assert!(encoded.trim_end().ends_with('Q'));
    }
}
