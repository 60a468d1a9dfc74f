// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotation objects: highlight and redaction markers, listing, and removal.

use blattwerk_core::error::Result;
use blattwerk_core::types::{Rect, Rgb};
use lopdf::content::{Content, Operation};
use lopdf::{Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument};

use super::document::{PdfDocument, encode_content, real_array, rect_from_object};

/// Annotation subtypes that survive [`PdfDocument::strip_annotations`].
const KEPT_SUBTYPES: [&str; 2] = ["Widget", "Link"];

/// Summary of an annotation on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInfo {
    pub id: ObjectId,
    pub subtype: String,
    /// Position in caller space.
    pub rect: Rect,
}

/// A PDF date string for the current time.
pub(crate) fn pdf_now() -> Object {
    Object::string_literal(chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string())
}

/// QuadPoints of a single box: upper-left, upper-right, lower-left, lower-right.
fn quad_points([x0, y0, x1, y1]: [f32; 4]) -> Object {
    real_array(&[x0, y1, x1, y1, x0, y0, x1, y0])
}

impl PdfDocument {
    /// Annotations on a 1-based page.
    pub fn annotations(&self, page: u32) -> Result<Vec<AnnotationInfo>> {
        let page_id = self.page_id(page)?;
        let geometry = self.geometry(page_id);
        Ok(self
            .annotation_ids(page_id)
            .into_iter()
            .map(|id| {
                let rect = self
                    .inner()
                    .get_dictionary(id)
                    .ok()
                    .and_then(|dict| dict.get(b"Rect").ok())
                    .and_then(|obj| rect_from_object(self.inner(), obj))
                    .map(|user| geometry.rect_to_device(user))
                    .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
                AnnotationInfo {
                    id,
                    subtype: self.annotation_subtype(id).unwrap_or_default(),
                    rect,
                }
            })
            .collect())
    }

    /// Remove one annotation from a 1-based page.
    pub fn delete_annotation(&mut self, page: u32, annot_id: ObjectId) -> Result<()> {
        let page_id = self.page_id(page)?;
        self.remove_annotations(page_id, &[annot_id])
    }

    /// Mark `rect` (caller space) with a highlight annotation. The appearance
    /// stream multiplies the colour onto the page so the text stays legible.
    pub fn add_highlight_annot(&mut self, page: u32, rect: Rect, color: Rgb) -> Result<ObjectId> {
        let page_id = self.page_id(page)?;
        let user = self.geometry(page_id).rect_to_user(rect);
        let [x0, y0, x1, y1] = user;
        let [r, g, b] = color.components();

        let appearance = Content {
            operations: vec![
                Operation::new("gs", vec![Object::Name(b"BwMultiply".to_vec())]),
                Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
                Operation::new(
                    "re",
                    vec![
                        Object::Real(x0),
                        Object::Real(y0),
                        Object::Real(x1 - x0),
                        Object::Real(y1 - y0),
                    ],
                ),
                Operation::new("f", vec![]),
            ],
        };
        let appearance_id = self.inner_mut().add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => real_array(&user),
                "Resources" => dictionary! {
                    "ExtGState" => dictionary! {
                        "BwMultiply" => dictionary! {
                            "Type" => "ExtGState",
                            "BM" => "Multiply",
                            "ca" => Object::Real(1.0),
                        },
                    },
                },
            },
            encode_content(appearance)?,
        ));

        let annot_id = self.push_annotation(
            page_id,
            dictionary! {
                "Type" => "Annot",
                "Subtype" => "Highlight",
                "Rect" => real_array(&user),
                "QuadPoints" => quad_points(user),
                "C" => real_array(&color.components()),
                "CA" => Object::Real(1.0),
                "F" => Object::Integer(4),
                "NM" => Object::string_literal(uuid::Uuid::new_v4().to_string()),
                "M" => pdf_now(),
                "AP" => dictionary! { "N" => appearance_id },
            },
        )?;
        debug!(?annot_id, ?rect, "Highlight added");
        Ok(annot_id)
    }

    /// Mark `rect` (caller space) for removal by
    /// [`PdfDocument::apply_redactions`].
    pub fn add_redact_annot(&mut self, page: u32, rect: Rect) -> Result<ObjectId> {
        let page_id = self.page_id(page)?;
        self.add_redact_annot_on(page_id, rect)
    }

    pub(crate) fn add_redact_annot_on(&mut self, page_id: ObjectId, rect: Rect) -> Result<ObjectId> {
        let user = self.geometry(page_id).rect_to_user(rect);
        self.push_annotation(
            page_id,
            dictionary! {
                "Type" => "Annot",
                "Subtype" => "Redact",
                "Rect" => real_array(&user),
                "QuadPoints" => quad_points(user),
                "IC" => real_array(&Rgb::BLACK.components()),
                "F" => Object::Integer(4),
                "M" => pdf_now(),
            },
        )
    }

    /// Remove every annotation except form widgets and links. Returns how
    /// many were removed.
    #[instrument(skip(self))]
    pub fn strip_annotations(&mut self) -> Result<usize> {
        let mut removed = 0;
        for page_id in self.page_ids() {
            let doomed: Vec<ObjectId> = self
                .annotation_ids(page_id)
                .into_iter()
                .filter(|id| {
                    let subtype = self.annotation_subtype(*id).unwrap_or_default();
                    !KEPT_SUBTYPES.contains(&subtype.as_str())
                })
                .collect();
            if doomed.is_empty() {
                continue;
            }
            removed += doomed.len();
            self.remove_annotations(page_id, &doomed)?;
        }
        info!(removed, "Annotations stripped");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::text_pdf;

    #[test]
    fn highlight_round_trips_its_rect() {
        let mut doc = text_pdf(&[&["Hello"]]);
        let rect = Rect::new(72.0, 82.4, 100.0, 94.4);
        doc.add_highlight_annot(1, rect, Rgb::YELLOW).unwrap();

        let annots = doc.annotations(1).unwrap();
        assert_eq!(annots.len(), 1);
        assert_eq!(annots[0].subtype, "Highlight");
        assert!((annots[0].rect.x0 - rect.x0).abs() < 1e-3);
        assert!((annots[0].rect.y1 - rect.y1).abs() < 1e-3);

        let dict = doc.inner().get_dictionary(annots[0].id).unwrap();
        assert!(dict.has(b"AP"));
        assert_eq!(dict.get(b"QuadPoints").unwrap().as_array().unwrap().len(), 8);
    }

    #[test]
    fn strip_keeps_widgets_and_links() {
        let mut doc = text_pdf(&[&["x"], &["y"]]);
        let page1 = doc.page_ids()[0];
        let page2 = doc.page_ids()[1];
        for subtype in ["Text", "Widget", "Link", "Square"] {
            doc.push_annotation(page1, dictionary! { "Type" => "Annot", "Subtype" => subtype })
                .unwrap();
        }
        doc.add_highlight_annot(2, Rect::new(0.0, 0.0, 5.0, 5.0), Rgb::GREEN).unwrap();

        assert_eq!(doc.strip_annotations().unwrap(), 3);
        let left: Vec<String> = doc.annotations(1).unwrap().into_iter().map(|a| a.subtype).collect();
        assert_eq!(left, vec!["Widget".to_string(), "Link".to_string()]);
        assert!(doc.annotation_ids(page2).is_empty());
    }

    #[test]
    fn delete_single_annotation() {
        let mut doc = text_pdf(&[&["x"]]);
        let id = doc.add_redact_annot(1, Rect::new(0.0, 0.0, 5.0, 5.0)).unwrap();
        doc.delete_annotation(1, id).unwrap();
        assert!(doc.annotations(1).unwrap().is_empty());
        assert!(doc.inner().get_object(id).is_err());
    }
}
