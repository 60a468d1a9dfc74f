// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Destructive text removal and the search-driven operations built on it:
// redact, replace, edit and highlight.
//
// Applying a redaction re-lays out the page, finds every glyph whose centre
// falls inside a Redact annotation, and rewrites the string operands that
// carry those glyphs. Each removed glyph becomes a negative TJ adjustment of
// the same advance so the glyphs around it keep their positions. Glyphs drawn
// by a Form XObject are cut from the form's own stream, which changes every
// page that draws that form.

use std::collections::HashMap;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::{Rect, Rgb, TextChange};
use lopdf::content::{Content, Operation};
use lopdf::{Object, ObjectId, StringFormat};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::document::{PdfDocument, encode_content, rect_from_object};
use super::overlay::{TextAlign, fill_rect_ops};
use super::text::{GlyphSource, form_content, layout_content};

/// Cuts for one content stream: op index -> TJ element -> cuts.
type StreamPlan = HashMap<usize, HashMap<usize, Vec<Cut>>>;

/// A glyph slated for removal: its byte range and compensating advance.
#[derive(Debug, Clone, Copy)]
struct Cut {
    offset: usize,
    len: usize,
    advance: f32,
}

impl From<&GlyphSource> for Cut {
    fn from(source: &GlyphSource) -> Self {
        Self {
            offset: source.offset,
            len: source.len,
            advance: source.advance,
        }
    }
}

/// Push a TJ element, folding consecutive adjustments into one number.
fn push_element(items: &mut Vec<Object>, item: Object) {
    if let Object::Real(value) = item {
        if let Some(Object::Real(last)) = items.last_mut() {
            *last += value;
            return;
        }
    }
    items.push(item);
}

/// Split a string operand around the removed glyphs.
fn cut_string(bytes: &[u8], format: StringFormat, cuts: &mut [Cut], out: &mut Vec<Object>) {
    cuts.sort_by_key(|cut| cut.offset);
    let mut cursor = 0;
    for cut in cuts.iter() {
        // The same glyph is planned twice when its form is drawn twice.
        if cut.offset < cursor {
            continue;
        }
        if cut.offset > cursor {
            push_element(out, Object::String(bytes[cursor..cut.offset].to_vec(), format));
        }
        push_element(out, Object::Real(cut.advance));
        cursor = cut.offset + cut.len;
    }
    if cursor < bytes.len() {
        push_element(out, Object::String(bytes[cursor..].to_vec(), format));
    }
}

fn tj(items: Vec<Object>) -> Operation {
    Operation::new("TJ", vec![Object::Array(items)])
}

/// Rewrite one text-showing operation with `cuts` keyed by TJ element.
fn rewrite(op: Operation, mut cuts: HashMap<usize, Vec<Cut>>) -> Vec<Operation> {
    let shown = |operand: Option<&Object>, cuts: &mut HashMap<usize, Vec<Cut>>| {
        let mut items = Vec::new();
        if let Some(Object::String(bytes, format)) = operand {
            let mut element_cuts = cuts.remove(&0).unwrap_or_default();
            cut_string(bytes, *format, &mut element_cuts, &mut items);
        }
        items
    };

    match op.operator.as_str() {
        "Tj" => vec![tj(shown(op.operands.first(), &mut cuts))],
        "'" => vec![
            Operation::new("T*", vec![]),
            tj(shown(op.operands.first(), &mut cuts)),
        ],
        "\"" => {
            let word = op.operands.first().cloned().unwrap_or(Object::Integer(0));
            let char_spacing = op.operands.get(1).cloned().unwrap_or(Object::Integer(0));
            vec![
                Operation::new("Tw", vec![word]),
                Operation::new("Tc", vec![char_spacing]),
                Operation::new("T*", vec![]),
                tj(shown(op.operands.get(2), &mut cuts)),
            ]
        }
        "TJ" => {
            let Some(Object::Array(elements)) = op.operands.first() else {
                return vec![op];
            };
            let mut items = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                match (element, cuts.get_mut(&index)) {
                    (Object::String(bytes, format), Some(element_cuts)) => {
                        cut_string(bytes, *format, element_cuts, &mut items)
                    }
                    (Object::Integer(value), _) => push_element(&mut items, Object::Real(*value as f32)),
                    (other, _) => push_element(&mut items, other.clone()),
                }
            }
            vec![tj(items)]
        }
        _ => vec![op],
    }
}

/// Apply `plan` to the operations of one stream.
fn rewrite_all(operations: Vec<Operation>, mut plan: StreamPlan) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len());
    for (index, op) in operations.into_iter().enumerate() {
        match plan.remove(&index) {
            Some(cuts) => out.extend(rewrite(op, cuts)),
            None => out.push(op),
        }
    }
    out
}

impl PdfDocument {
    /// Cut glyphs out of a Form XObject's stream, in place.
    fn rewrite_form(&mut self, form_id: ObjectId, plan: StreamPlan) -> Result<()> {
        let content = form_content(self.inner(), form_id)?;
        let bytes = encode_content(Content {
            operations: rewrite_all(content.operations, plan),
        })?;
        match self.inner_mut().get_object_mut(form_id) {
            Ok(Object::Stream(stream)) => {
                stream.set_plain_content(bytes);
                debug!(?form_id, "Form XObject text rewritten");
                Ok(())
            }
            _ => Err(BlattwerkError::PdfError(format!(
                "form {:?} is not a stream",
                form_id
            ))),
        }
    }

    /// Remove the text under every Redact annotation on `page_id`, paint the
    /// areas black and delete the annotations. Returns the number of glyphs
    /// removed.
    pub(crate) fn apply_redactions_on(&mut self, page_id: ObjectId) -> Result<usize> {
        let geometry = self.geometry(page_id);
        let mut annots = Vec::new();
        let mut areas = Vec::new();
        for id in self.annotation_ids(page_id) {
            if self.annotation_subtype(id).as_deref() != Some("Redact") {
                continue;
            }
            let user = self
                .inner()
                .get_dictionary(id)
                .ok()
                .and_then(|dict| dict.get(b"Rect").ok())
                .and_then(|obj| rect_from_object(self.inner(), obj));
            if let Some(user) = user {
                areas.push(user);
            }
            annots.push(id);
        }
        if annots.is_empty() {
            return Ok(0);
        }

        let content = self.page_content(page_id)?;
        let layout = layout_content(self, page_id, &content);
        let device_areas: Vec<Rect> = areas.iter().map(|a| geometry.rect_to_device(*a)).collect();

        let mut plans: HashMap<Option<ObjectId>, StreamPlan> = HashMap::new();
        let mut removed = 0;
        for glyph in &layout.glyphs {
            let centre = glyph.bbox.center();
            if device_areas.iter().any(|area| area.contains(centre)) {
                plans
                    .entry(glyph.source.stream)
                    .or_default()
                    .entry(glyph.source.op)
                    .or_default()
                    .entry(glyph.source.element)
                    .or_default()
                    .push(Cut::from(&glyph.source));
                removed += 1;
            }
        }

        let page_plan = plans.remove(&None).unwrap_or_default();
        for (form_id, plan) in plans {
            if let Some(form_id) = form_id {
                self.rewrite_form(form_id, plan)?;
            }
        }

        let mut operations = Vec::with_capacity(content.operations.len() + 2 + 5 * areas.len());
        operations.push(Operation::new("q", vec![]));
        operations.extend(rewrite_all(content.operations, page_plan));
        operations.push(Operation::new("Q", vec![]));
        for area in &areas {
            operations.extend(fill_rect_ops(*area, Rgb::BLACK));
        }

        self.set_page_content(page_id, Content { operations })?;
        self.remove_annotations(page_id, &annots)?;
        self.prune();
        debug!(?page_id, areas = areas.len(), removed, "Redactions applied");
        Ok(removed)
    }

    /// Apply every pending Redact annotation on a 1-based page.
    pub fn apply_redactions(&mut self, page: u32) -> Result<usize> {
        let page_id = self.page_id(page)?;
        self.apply_redactions_on(page_id)
    }

    /// Mark `rects` for redaction and apply them. No-op for an empty list.
    pub(crate) fn redact_rects(&mut self, page_id: ObjectId, rects: &[Rect]) -> Result<()> {
        if rects.is_empty() {
            return Ok(());
        }
        for rect in rects {
            self.add_redact_annot_on(page_id, *rect)?;
        }
        self.apply_redactions_on(page_id)?;
        Ok(())
    }

    /// Permanently remove every occurrence of `needle`. Returns the number of
    /// occurrences redacted.
    #[instrument(skip(self))]
    pub fn redact_text(&mut self, needle: &str) -> Result<usize> {
        let mut total = 0;
        for (index, page_id) in self.page_ids().into_iter().enumerate() {
            let hits = self.text_layout(index as u32 + 1)?.search(needle);
            total += hits.len();
            self.redact_rects(page_id, &hits)?;
        }
        info!(occurrences = total, "Text redacted");
        Ok(total)
    }

    /// Permanently remove every match of `pattern`.
    pub fn redact_regex(&mut self, pattern: &Regex) -> Result<usize> {
        let mut total = 0;
        for (index, page_id) in self.page_ids().into_iter().enumerate() {
            let hits = self.text_layout(index as u32 + 1)?.search_regex(pattern);
            total += hits.len();
            self.redact_rects(page_id, &hits)?;
        }
        debug!(pattern = pattern.as_str(), matches = total, "Pattern redacted");
        Ok(total)
    }

    /// Redact `old` on one page and write `new` at the top-left corner of
    /// the first match. Returns the number of matches.
    fn replace_on_page(&mut self, page: u32, old: &str, new: &str, font_size: f32) -> Result<usize> {
        let page_id = self.page_id(page)?;
        let hits = self.text_layout(page)?.search(old);
        let Some(first) = hits.first().copied() else {
            return Ok(0);
        };
        self.redact_rects(page_id, &hits)?;
        self.insert_text_on(page_id, first.top_left(), new, font_size, Rgb::BLACK, TextAlign::Left)?;
        Ok(hits.len())
    }

    /// Replace `old` with `new` on every page. The replacement is written
    /// once per page, at the first match; the text is not reflowed.
    #[instrument(skip(self))]
    pub fn replace_text(&mut self, old: &str, new: &str, font_size: f32) -> Result<usize> {
        let mut total = 0;
        for page in 1..=self.page_count() {
            total += self.replace_on_page(page, old, new, font_size)?;
        }
        info!(occurrences = total, "Text replaced");
        Ok(total)
    }

    /// Apply page-targeted replacements. Changes aimed at pages that do not
    /// exist are skipped.
    #[instrument(skip_all, fields(changes = changes.len()))]
    pub fn edit_text(&mut self, changes: &[TextChange], font_size: f32) -> Result<usize> {
        let mut total = 0;
        for change in changes {
            if change.page == 0 || change.page > self.page_count() {
                warn!(page = change.page, "Edit skipped: page out of range");
                continue;
            }
            total += self.replace_on_page(change.page, &change.old_text, &change.new_text, font_size)?;
        }
        Ok(total)
    }

    /// Highlight every occurrence of `needle`. Returns the number of
    /// highlight annotations added.
    #[instrument(skip(self))]
    pub fn highlight_text(&mut self, needle: &str, color: Rgb) -> Result<usize> {
        let mut total = 0;
        for page in 1..=self.page_count() {
            for rect in self.search_for(page, needle)? {
                self.add_highlight_annot(page, rect, color)?;
                total += 1;
            }
        }
        info!(highlights = total, "Text highlighted");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::{text_form, text_pdf};
    use crate::pdf::overlay::WatermarkOptions;

    fn content_bytes(doc: &PdfDocument, page: u32) -> Vec<u8> {
        let page_id = doc.page_id(page).unwrap();
        doc.inner().get_page_content(page_id).unwrap()
    }

    #[test]
    fn cut_string_folds_adjacent_adjustments() {
        let mut out = Vec::new();
        let mut cuts = [
            Cut { offset: 2, len: 1, advance: -300.0 },
            Cut { offset: 1, len: 1, advance: -200.0 },
        ];
        cut_string(b"abcd", StringFormat::Literal, &mut cuts, &mut out);
        assert_eq!(
            out,
            vec![
                Object::String(b"a".to_vec(), StringFormat::Literal),
                Object::Real(-500.0),
                Object::String(b"d".to_vec(), StringFormat::Literal),
            ]
        );
    }

    #[test]
    fn redaction_removes_text_but_keeps_neighbours_in_place() {
        let mut doc = text_pdf(&[&["public SECRET public"]]);
        let before = doc.text_layout(1).unwrap();
        let last_before = before.glyphs.last().unwrap().origin;

        assert_eq!(doc.redact_text("SECRET").unwrap(), 1);

        let after = doc.text_layout(1).unwrap();
        let text = after.text();
        assert!(!text.contains("SECRET"), "still present: {text}");
        assert!(text.starts_with("public"));
        assert!(text.ends_with("public"));
        let last_after = after.glyphs.last().unwrap().origin;
        assert!((last_before.x - last_after.x).abs() < 1e-2);
        assert!(doc.annotations(1).unwrap().is_empty());
    }

    #[test]
    fn redaction_paints_black_box() {
        let mut doc = text_pdf(&[&["top secret"]]);
        doc.redact_text("secret").unwrap();
        let page_id = doc.page_id(1).unwrap();
        let ops = doc.page_content(page_id).unwrap().operations;
        assert!(ops.iter().any(|op| op.operator == "re"));
        assert!(ops.iter().any(|op| op.operator == "f"));
    }

    #[test]
    fn redacting_absent_text_leaves_content_unchanged() {
        let mut doc = text_pdf(&[&["nothing to see"]]);
        let before = content_bytes(&doc, 1);
        assert_eq!(doc.redact_text("classified").unwrap(), 0);
        assert_eq!(content_bytes(&doc, 1), before);
    }

    #[test]
    fn replace_writes_once_per_page() {
        let mut doc = text_pdf(&[&["old and old"], &["nothing"]]);
        assert_eq!(doc.replace_text("old", "new", 12.0).unwrap(), 2);
        let text = doc.page_text(1).unwrap();
        assert_eq!(text.matches("new").count(), 1);
        assert!(!text.contains("old"));
        assert_eq!(doc.page_text(2).unwrap(), "nothing");
    }

    #[test]
    fn edit_text_targets_pages_and_skips_missing_ones() {
        let mut doc = text_pdf(&[&["alpha"], &["alpha"]]);
        let changes = vec![
            TextChange { page: 2, old_text: "alpha".into(), new_text: "beta".into() },
            TextChange { page: 9, old_text: "alpha".into(), new_text: "gamma".into() },
        ];
        assert_eq!(doc.edit_text(&changes, 12.0).unwrap(), 1);
        assert_eq!(doc.page_text(1).unwrap(), "alpha");
        assert!(doc.page_text(2).unwrap().contains("beta"));
    }

    #[test]
    fn highlight_is_non_destructive() {
        let mut doc = text_pdf(&[&["mark me", "and me"]]);
        let before = content_bytes(&doc, 1);
        assert_eq!(doc.highlight_text("me", Rgb::YELLOW).unwrap(), 2);
        assert_eq!(content_bytes(&doc, 1), before);
        assert_eq!(doc.annotations(1).unwrap().len(), 2);
    }

    #[test]
    fn watermark_then_redact_survives_a_reopen() {
        let mut doc = text_pdf(&[&["keep SECRET keep"]]);
        doc.add_watermark("DRAFT", &WatermarkOptions::default()).unwrap();
        let raw = content_bytes(&doc, 1);
        assert!(!raw.windows(3).any(|w| w == b"ETQ"));

        assert_eq!(doc.redact_text("SECRET").unwrap(), 1);
        let bytes = doc.to_bytes().unwrap();
        let reopened = PdfDocument::from_bytes(&bytes).unwrap();
        let page_id = reopened.page_id(1).unwrap();
        let ops = reopened.page_content(page_id).unwrap().operations;
        let saves = ops.iter().filter(|op| op.operator == "q").count();
        let restores = ops.iter().filter(|op| op.operator == "Q").count();
        assert_eq!(saves, restores);
        assert!(ops.iter().all(|op| op.operator != "ETQ"));

        let text = reopened.page_text(1).unwrap();
        assert!(!text.contains("SECRET"), "still present: {text}");
        assert!(text.contains("keep"));
        assert!(text.contains("DRAFT"));
    }

    #[test]
    fn redaction_reaches_text_inside_forms() {
        let mut doc = text_pdf(&[&["page SECRET"]]);
        let form_id = text_form(&mut doc, 1, "form SECRET", 100.0);
        assert_eq!(doc.redact_text("SECRET").unwrap(), 2);

        let text = doc.page_text(1).unwrap();
        assert!(!text.contains("SECRET"), "still present: {text}");
        assert!(text.contains("page"));
        assert!(text.contains("form"));
        let form = encode_content(form_content(doc.inner(), form_id).unwrap()).unwrap();
        assert!(!form.windows(6).any(|w| w == b"SECRET"));
    }

    #[test]
    fn replacement_starts_at_the_first_match() {
        let mut doc = text_pdf(&[&["name: OLD"]]);
        let first = doc.search_for(1, "OLD").unwrap()[0];
        doc.replace_text("OLD", "NEW", 12.0).unwrap();

        let layout = doc.text_layout(1).unwrap();
        assert_eq!(layout.search("NEW").len(), 1);
        let start = layout
            .glyphs
            .iter()
            .find(|glyph| glyph.text == "N")
            .map(|glyph| glyph.origin)
            .unwrap();
        assert!((start.x - first.x0).abs() < 1e-2, "{start:?} vs {first:?}");
        assert!((start.y - first.y0).abs() < 1e-2, "{start:?} vs {first:?}");
    }

    #[test]
    fn tj_rewrite_preserves_kerning_numbers() {
        let op = Operation::new(
            "TJ",
            vec![Object::Array(vec![
                Object::string_literal("ab"),
                Object::Integer(-100),
                Object::string_literal("cd"),
            ])],
        );
        let mut cuts = HashMap::new();
        cuts.insert(2, vec![Cut { offset: 0, len: 1, advance: -556.0 }]);
        let rewritten = rewrite(op, cuts);
        assert_eq!(rewritten.len(), 1);
        let items = rewritten[0].operands[0].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], Object::Real(-656.0));
    }
}
