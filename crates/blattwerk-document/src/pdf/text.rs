// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text layout: walk a page's content stream, position every glyph, group the
// glyphs into lines, and search those lines.

use std::collections::HashMap;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::{Point, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::Regex;
use tracing::{debug, instrument};

use super::document::{PageGeometry, PdfDocument, number, resolve, resolve_dict};
use super::fonts::FontInfo;

/// Glyph box below the baseline, as a fraction of the font size.
const DESCENT: f32 = -0.2;
/// Glyph box above the baseline, as a fraction of the font size.
const ASCENT: f32 = 0.8;
/// Horizontal gap (in em) that reads as a word break.
const SPACE_GAP_EM: f32 = 0.25;
/// Deepest chain of nested Form XObjects the interpreter follows.
const MAX_FORM_DEPTH: usize = 8;

/// A 2D affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self { e: tx, f: ty, ..Self::IDENTITY }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        Some(Self {
            a: number(&operands[0])?,
            b: number(&operands[1])?,
            c: number(&operands[2])?,
            d: number(&operands[3])?,
            e: number(&operands[4])?,
            f: number(&operands[5])?,
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }
}

/// Where a glyph's bytes live in the decoded content stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GlyphSource {
    /// Form XObject holding the operation, `None` for the page's own content.
    pub stream: Option<ObjectId>,
    /// Index of the text-showing operation.
    pub op: usize,
    /// Element index inside a `TJ` array (0 for `Tj`, `'` and `"`).
    pub element: usize,
    /// Byte range of the glyph's code inside the string operand.
    pub offset: usize,
    pub len: usize,
    /// `TJ` adjustment (thousandths of text space) that reproduces the
    /// glyph's full advance when the glyph itself is removed.
    pub advance: f32,
}

/// A positioned glyph. Geometry is in caller space (top-left origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub bbox: Rect,
    /// Baseline start of the glyph.
    pub origin: Point,
    /// Effective font size after all transforms.
    pub size: f32,
    /// Unit vector of the baseline direction in caller space.
    pub(crate) direction: (f32, f32),
    /// Advance length along the baseline.
    pub(crate) advance_len: f32,
    pub(crate) source: GlyphSource,
}

/// A line of text with a per-character link back to the glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// For each char of `text`: its byte offset and glyph index (`None` for
    /// spaces synthesised from gaps).
    chars: Vec<(usize, Option<usize>)>,
}

impl TextLine {
    /// Union of the glyph boxes covering the byte range `start..end` of `text`.
    fn bbox(&self, glyphs: &[Glyph], start: usize, end: usize) -> Option<Rect> {
        self.chars
            .iter()
            .filter(|(offset, _)| *offset >= start && *offset < end)
            .filter_map(|(_, glyph)| glyph.map(|g| glyphs[g].bbox))
            .reduce(|a, b| a.union(&b))
    }
}

/// Positioned glyphs and reconstructed lines of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub glyphs: Vec<Glyph>,
    pub lines: Vec<TextLine>,
}

impl PageText {
    /// Plain text, one line per row.
    pub fn text(&self) -> String {
        self.line_texts().join("\n")
    }

    pub fn line_texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    /// Boxes of every exact, case-sensitive occurrence of `needle`.
    /// Matches never span lines.
    pub fn search(&self, needle: &str) -> Vec<Rect> {
        if needle.is_empty() {
            return Vec::new();
        }
        self.lines
            .iter()
            .flat_map(|line| {
                line.text
                    .match_indices(needle)
                    .filter_map(|(start, m)| line.bbox(&self.glyphs, start, start + m.len()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Boxes of every non-empty match of `pattern`, line by line.
    pub fn search_regex(&self, pattern: &Regex) -> Vec<Rect> {
        self.lines
            .iter()
            .flat_map(|line| {
                pattern
                    .find_iter(&line.text)
                    .filter(|m| !m.as_str().is_empty())
                    .filter_map(|m| line.bbox(&self.glyphs, m.start(), m.end()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

// -- Interpreter ----------------------------------------------------------------

/// Graphics-state entries that matter for text placement.
#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    /// Horizontal scaling as a fraction (Tz / 100).
    scale: f32,
    leading: f32,
    rise: f32,
    font: Option<Vec<u8>>,
    size: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            size: 0.0,
        }
    }
}

/// Resources in effect for one content stream.
#[derive(Clone)]
struct Scope {
    fonts: Dictionary,
    xobjects: Dictionary,
    loaded: HashMap<Vec<u8>, FontInfo>,
}

impl Scope {
    fn new(doc: &Document, resources: &Dictionary) -> Self {
        let category = |key: &[u8]| {
            resources
                .get(key)
                .ok()
                .and_then(|obj| resolve_dict(doc, obj))
                .cloned()
                .unwrap_or_default()
        };
        Self {
            fonts: category(b"Font"),
            xobjects: category(b"XObject"),
            loaded: HashMap::new(),
        }
    }
}

/// Decoded content of a Form XObject.
pub(crate) fn form_content(doc: &Document, form_id: ObjectId) -> Result<Content> {
    let stream = doc
        .get_object(form_id)
        .and_then(Object::as_stream)
        .map_err(|err| BlattwerkError::PdfError(format!("cannot read form {:?}: {}", form_id, err)))?;
    let bytes = stream.get_plain_content().map_err(|err| {
        BlattwerkError::PdfError(format!("cannot decode form {:?}: {}", form_id, err))
    })?;
    Content::decode(&bytes)
        .map_err(|err| BlattwerkError::PdfError(format!("cannot parse form {:?}: {}", form_id, err)))
}

struct Interpreter<'a> {
    doc: &'a PdfDocument,
    geometry: PageGeometry,
    scope: Scope,
    /// Form XObjects being drawn, innermost last.
    forms: Vec<ObjectId>,
    state: TextState,
    stack: Vec<TextState>,
    tm: Matrix,
    tlm: Matrix,
    glyphs: Vec<Glyph>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a PdfDocument, page_id: ObjectId) -> Self {
        Self {
            doc,
            geometry: doc.geometry(page_id),
            scope: Scope::new(doc.inner(), &doc.resources(page_id)),
            forms: Vec::new(),
            state: TextState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            glyphs: Vec::new(),
        }
    }

    fn run(mut self, operations: &[Operation]) -> Vec<Glyph> {
        self.walk(operations);
        self.glyphs
    }

    fn walk(&mut self, operations: &[Operation]) {
        for (index, op) in operations.iter().enumerate() {
            self.step(index, op);
        }
    }

    /// Lay out the Form XObject registered as `name`, in its own resources
    /// and under its `/Matrix`. Image XObjects and cycles are skipped.
    fn draw_form(&mut self, name: &[u8]) {
        let pdf = self.doc;
        let doc = pdf.inner();
        let Some(form_id) = self
            .scope
            .xobjects
            .get(name)
            .ok()
            .and_then(|obj| obj.as_reference().ok())
        else {
            return;
        };
        let Ok(dict) = doc.get_object(form_id).and_then(Object::as_stream).map(|s| &s.dict) else {
            return;
        };
        if dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(b"Form".as_slice()) {
            return;
        }
        if self.forms.contains(&form_id) || self.forms.len() >= MAX_FORM_DEPTH {
            debug!(?form_id, depth = self.forms.len(), "Form XObject not followed");
            return;
        }
        let content = match form_content(doc, form_id) {
            Ok(content) => content,
            Err(err) => {
                debug!(?form_id, %err, "Form XObject skipped");
                return;
            }
        };
        let matrix = match dict.get(b"Matrix").map(|obj| resolve(doc, obj)) {
            Ok(Object::Array(items)) => Matrix::from_operands(items).unwrap_or(Matrix::IDENTITY),
            _ => Matrix::IDENTITY,
        };
        // A form without resources draws with its parent's.
        let scope = match dict.get(b"Resources").ok().and_then(|obj| resolve_dict(doc, obj)) {
            Some(resources) => Scope::new(doc, resources),
            None => self.scope.clone(),
        };

        let outer_scope = std::mem::replace(&mut self.scope, scope);
        let outer_state = self.state.clone();
        let (tm, tlm) = (self.tm, self.tlm);
        let depth = self.stack.len();
        self.state.ctm = matrix.then(&self.state.ctm);
        self.forms.push(form_id);

        self.walk(&content.operations);

        self.forms.pop();
        self.stack.truncate(depth);
        self.state = outer_state;
        self.tm = tm;
        self.tlm = tlm;
        self.scope = outer_scope;
    }

    fn step(&mut self, index: usize, op: &Operation) {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(number);
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.state.font = Some(name.clone());
                }
                if let Some(size) = num(1) {
                    self.state.size = size;
                }
            }
            "Tc" => self.state.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.rise = num(0).unwrap_or(0.0),
            "Td" => self.move_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
            "TD" => {
                let ty = num(1).unwrap_or(0.0);
                self.state.leading = -ty;
                self.move_line(num(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, index, 0);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, index, 0);
                }
            }
            "\"" => {
                self.state.word_spacing = num(0).unwrap_or(self.state.word_spacing);
                self.state.char_spacing = num(1).unwrap_or(self.state.char_spacing);
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes, index, 0);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for (element, item) in items.iter().enumerate() {
                        match item {
                            Object::String(bytes, _) => self.show(bytes, index, element),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0 * self.state.size * self.state.scale;
                                    self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                                }
                            }
                        }
                    }
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.draw_form(name);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn font(&mut self) -> FontInfo {
        let Some(name) = self.state.font.clone() else {
            return FontInfo::fallback();
        };
        if let Some(info) = self.scope.loaded.get(&name) {
            return info.clone();
        }
        let info = self
            .scope
            .fonts
            .get(&name)
            .ok()
            .and_then(|obj| resolve_dict(self.doc.inner(), obj))
            .map(|dict| FontInfo::load(self.doc.inner(), dict))
            .unwrap_or_else(FontInfo::fallback);
        self.scope.loaded.insert(name, info.clone());
        info
    }

    fn show(&mut self, bytes: &[u8], op: usize, element: usize) {
        let font = self.font();
        let TextState {
            ctm,
            char_spacing,
            word_spacing,
            scale,
            rise,
            size,
            ..
        } = self.state.clone();

        for (offset, len, code) in font.codes(bytes) {
            let w0 = font.width(code) / 1000.0;
            let spacing = char_spacing
                + if font.is_word_space(len, code) {
                    word_spacing
                } else {
                    0.0
                };

            let render = Matrix {
                a: size * scale,
                b: 0.0,
                c: 0.0,
                d: size,
                e: 0.0,
                f: rise,
            }
            .then(&self.tm)
            .then(&ctm);

            let corners = [
                render.apply(0.0, DESCENT),
                render.apply(w0, DESCENT),
                render.apply(0.0, ASCENT),
                render.apply(w0, ASCENT),
            ];
            let (mut x0, mut y0, mut x1, mut y1) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
            for (x, y) in corners {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
            let (ox, oy) = render.apply(0.0, 0.0);
            let advance_len = (render.a * render.a + render.b * render.b).sqrt() * w0;
            let direction = {
                // Caller space flips y.
                let (dx, dy) = (render.a, -render.b);
                let len = (dx * dx + dy * dy).sqrt();
                if len > f32::EPSILON { (dx / len, dy / len) } else { (1.0, 0.0) }
            };

            let advance = if size.abs() > f32::EPSILON {
                -(w0 * size + spacing) * 1000.0 / size
            } else {
                0.0
            };

            self.glyphs.push(Glyph {
                text: font.decode(code),
                bbox: self.geometry.rect_to_device([x0, y0, x1, y1]),
                origin: self.geometry.to_device(ox, oy),
                size: (render.c * render.c + render.d * render.d).sqrt(),
                direction,
                advance_len,
                source: GlyphSource {
                    stream: self.forms.last().copied(),
                    op,
                    element,
                    offset,
                    len,
                    advance,
                },
            });

            let tx = (w0 * size + spacing) * scale;
            self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
        }
    }
}

/// Group glyphs (in content order) into lines: a glyph continues the line
/// when it sits on the previous glyph's baseline and does not jump backwards.
fn build_lines(glyphs: &[Glyph]) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut current: Option<TextLine> = None;
    let mut previous: Option<&Glyph> = None;

    for (index, glyph) in glyphs.iter().enumerate() {
        // (distance off the baseline, progress along it) relative to the previous glyph
        let relation = previous.map(|prev| {
            let (dx, dy) = (glyph.origin.x - prev.origin.x, glyph.origin.y - prev.origin.y);
            let (ux, uy) = prev.direction;
            ((ux * dy - uy * dx).abs(), ux * dx + uy * dy)
        });
        let continues = match (previous, relation) {
            (Some(prev), Some((offset, progress))) => {
                let tolerance = 0.5 * prev.size.max(glyph.size).max(1.0);
                offset <= tolerance && progress >= -tolerance
            }
            _ => false,
        };

        let mut line = match current.take() {
            Some(mut line) if continues => {
                if let (Some(prev), Some((_, progress))) = (previous, relation) {
                    let gap = progress - prev.advance_len;
                    let ends_blank = line.text.ends_with(char::is_whitespace);
                    let starts_blank = glyph.text.starts_with(char::is_whitespace);
                    if gap > SPACE_GAP_EM * glyph.size && !ends_blank && !starts_blank {
                        line.chars.push((line.text.len(), None));
                        line.text.push(' ');
                    }
                }
                line
            }
            other => {
                if let Some(done) = other {
                    lines.push(done);
                }
                TextLine {
                    text: String::new(),
                    chars: Vec::new(),
                }
            }
        };

        for ch in glyph.text.chars() {
            line.chars.push((line.text.len(), Some(index)));
            line.text.push(ch);
        }
        current = Some(line);
        previous = Some(glyph);
    }

    if let Some(done) = current {
        lines.push(done);
    }
    lines
}

/// Lay out already-decoded content of a page. Glyph sources index into
/// `content.operations`.
pub(crate) fn layout_content(doc: &PdfDocument, page_id: ObjectId, content: &Content) -> PageText {
    let glyphs = Interpreter::new(doc, page_id).run(&content.operations);
    let lines = build_lines(&glyphs);
    PageText { glyphs, lines }
}

impl PdfDocument {
    /// Positioned glyphs and lines of a 1-based page.
    #[instrument(skip(self))]
    pub fn text_layout(&self, page: u32) -> Result<PageText> {
        let page_id = self.page_id(page)?;
        let content = self.page_content(page_id)?;
        let layout = layout_content(self, page_id, &content);
        debug!(glyphs = layout.glyphs.len(), lines = layout.lines.len(), "Page laid out");
        Ok(layout)
    }

    /// Plain text of a 1-based page.
    pub fn page_text(&self, page: u32) -> Result<String> {
        Ok(self.text_layout(page)?.text())
    }

    /// Boxes of every exact occurrence of `needle` on a 1-based page.
    pub fn search_for(&self, page: u32, needle: &str) -> Result<Vec<Rect>> {
        Ok(self.text_layout(page)?.search(needle))
    }

    /// Boxes of every match of `pattern` on a 1-based page.
    pub fn search_regex(&self, page: u32, pattern: &str) -> Result<Vec<Rect>> {
        let regex = Regex::new(pattern)
            .map_err(|err| BlattwerkError::Parse(format!("invalid pattern {pattern:?}: {err}")))?;
        Ok(self.text_layout(page)?.search_regex(&regex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::{text_form, text_pdf};
    use lopdf::dictionary;

    #[test]
    fn matrix_composition_applies_left_first() {
        let scale = Matrix { a: 2.0, d: 2.0, ..Matrix::IDENTITY };
        let shift = Matrix::translate(10.0, 5.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn extracts_lines_in_order() {
        let doc = text_pdf(&[&["Hello World", "Second line"]]);
        assert_eq!(doc.page_text(1).unwrap(), "Hello World\nSecond line");
    }

    #[test]
    fn glyph_boxes_follow_helvetica_metrics() {
        let doc = text_pdf(&[&["Hi"]]);
        let layout = doc.text_layout(1).unwrap();
        assert_eq!(layout.glyphs.len(), 2);
        let h = &layout.glyphs[0];
        // Baseline at y=700 in user space -> 92 from the top.
        assert_eq!(h.origin, Point::new(72.0, 92.0));
        assert!((h.bbox.x1 - (72.0 + 0.722 * 12.0)).abs() < 1e-3);
        assert!((h.bbox.y0 - (92.0 - 0.8 * 12.0)).abs() < 1e-3);
        assert!((h.bbox.y1 - (92.0 + 0.2 * 12.0)).abs() < 1e-3);
        assert_eq!(h.size, 12.0);
    }

    #[test]
    fn search_finds_each_occurrence_on_its_line() {
        let doc = text_pdf(&[&["cat and cat", "no match", "cat"]]);
        let hits = doc.search_for(1, "cat").unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].x1 < hits[1].x0);
        assert!(hits[2].y0 > hits[0].y1);
    }

    #[test]
    fn search_is_case_sensitive_and_ignores_empty_needles() {
        let doc = text_pdf(&[&["Secret"]]);
        assert!(doc.search_for(1, "secret").unwrap().is_empty());
        assert!(doc.search_for(1, "").unwrap().is_empty());
    }

    #[test]
    fn regex_search_and_invalid_pattern() {
        let doc = text_pdf(&[&["call 555-1234 now"]]);
        assert_eq!(doc.search_regex(1, r"\d{3}-\d{4}").unwrap().len(), 1);
        assert!(matches!(doc.search_regex(1, "("), Err(BlattwerkError::Parse(_))));
    }

    #[test]
    fn tj_kerning_gap_becomes_space() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]),
            Operation::new("Td", vec![Object::Integer(0), Object::Integer(0)]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("ab"),
                    Object::Integer(-400),
                    Object::string_literal("cd"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let doc = text_pdf(&[&[]]);
        let page_id = doc.page_ids()[0];
        let layout = layout_content(&doc, page_id, &Content { operations: ops });
        assert_eq!(layout.text(), "ab cd");
        assert_eq!(layout.glyphs[2].source.element, 2);
    }

    #[test]
    fn cm_and_q_restore_positions() {
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 0.into()],
            ),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]),
            Operation::new("Td", vec![Object::Integer(50), Object::Integer(100)]),
            Operation::new("Tj", vec![Object::string_literal("x")]),
            Operation::new("ET", vec![]),
        ];
        let doc = text_pdf(&[&[]]);
        let page_id = doc.page_ids()[0];
        let layout = layout_content(&doc, page_id, &Content { operations: ops });
        assert_eq!(layout.glyphs[0].origin, Point::new(50.0, 692.0));
    }

    #[test]
    fn form_xobject_text_is_laid_out_under_its_matrix() {
        let mut doc = text_pdf(&[&["page line"]]);
        let form_id = text_form(&mut doc, 1, "inside form", 100.0);
        let layout = doc.text_layout(1).unwrap();
        assert_eq!(layout.text(), "page line\ninside form");

        let first = layout
            .glyphs
            .iter()
            .find(|glyph| glyph.source.stream == Some(form_id))
            .unwrap();
        assert_eq!(first.text, "i");
        assert_eq!(first.origin, Point::new(72.0, 192.0));
        assert_eq!(doc.search_for(1, "inside").unwrap().len(), 1);
    }

    #[test]
    fn self_drawing_form_is_followed_once() {
        let mut doc = text_pdf(&[&[]]);
        let form_id = text_form(&mut doc, 1, "loop", 0.0);
        let Ok(Object::Stream(form)) = doc.inner_mut().get_object_mut(form_id) else {
            panic!("form stream missing");
        };
        let mut content = Content::decode(&form.content).unwrap();
        content.operations.push(Operation::new("Do", vec!["Me".into()]));
        form.set_plain_content(content.encode().unwrap());
        if let Ok(Object::Dictionary(resources)) = form.dict.get_mut(b"Resources") {
            resources.set("XObject", dictionary! { "Me" => form_id });
        }
        assert_eq!(doc.page_text(1).unwrap(), "loop");
    }
}
