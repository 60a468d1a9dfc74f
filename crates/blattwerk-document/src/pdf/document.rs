// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF document handle: open, inspect, copy pages between documents, and edit
// page resources and content streams using the `lopdf` crate.

use std::collections::HashMap;
use std::path::Path;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::{PageSize, Point, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument, warn};

use super::security;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Name of the Helvetica font resource added by overlay operations.
pub(crate) const HELVETICA_PREFIX: &str = "BwHelv";

/// An open PDF document.
///
/// Owns the underlying `lopdf::Document`. A handle lives for a single
/// operation: open, transform, save, drop.
pub struct PdfDocument {
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
    /// Helvetica font object shared by every page we write text on.
    helvetica: Option<ObjectId>,
    /// Alpha-only graphics states, keyed by the bit pattern of the alpha.
    alpha_states: HashMap<u32, ObjectId>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// An empty document with a catalog and an empty page tree.
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => Object::Integer(0),
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        Self::from_document(document, None)
    }

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_password(path, "")
    }

    /// Open a PDF, unlocking it with `password` if it is encrypted.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with_password(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let data = std::fs::read(path_ref)?;
        let document = security::load_document(&data, password).map_err(|err| match err {
            BlattwerkError::PdfError(detail) => {
                BlattwerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), detail))
            }
            other => other,
        })?;

        let doc = Self::from_document(document, Some(path_ref.display().to_string()));
        debug!(pages = doc.page_count(), "PDF loaded");
        Ok(doc)
    }

    /// Create a document from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_password(data, "")
    }

    /// Like [`PdfDocument::from_bytes`], unlocking with `password`.
    pub fn from_bytes_with_password(data: &[u8], password: &str) -> Result<Self> {
        let document = security::load_document(data, password)?;
        let doc = Self::from_document(document, None);
        debug!(pages = doc.page_count(), "PDF loaded from bytes");
        Ok(doc)
    }

    pub(crate) fn from_document(document: Document, source_path: Option<String>) -> Self {
        Self {
            document,
            source_path,
            helvetica: None,
            alpha_states: HashMap::new(),
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Return the source path if the document was opened from a file.
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// Object id of a 1-based page, failing when it does not exist.
    pub fn page_id(&self, page: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages
            .get(&page)
            .copied()
            .ok_or(BlattwerkError::PageOutOfRange {
                page,
                page_count: pages.len() as u32,
            })
    }

    /// Width and height (in points) of a 1-based page.
    pub fn page_size(&self, page: u32) -> Result<PageSize> {
        Ok(self.geometry(self.page_id(page)?).size())
    }

    /// The page's MediaBox, used to translate between caller (top-left) and
    /// PDF user space.
    pub(crate) fn geometry(&self, page_id: ObjectId) -> PageGeometry {
        let media = self
            .inherited_attribute(page_id, b"MediaBox")
            .and_then(|obj| rect_from_object(&self.document, obj));
        match media {
            Some([x0, y0, x1, y1]) if x1 > x0 && y1 > y0 => PageGeometry { x0, y0, x1, y1 },
            _ => PageGeometry::from_size(PageSize::LETTER),
        }
    }

    /// Look up a page attribute, walking up `/Parent` links if the page
    /// itself does not define it.
    pub(crate) fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        inherited_attribute(&self.document, page_id, key)
    }

    /// The page's resource dictionary with inheritance and a top-level
    /// reference resolved. Empty when the page has none.
    pub(crate) fn resources(&self, page_id: ObjectId) -> Dictionary {
        self.inherited_attribute(page_id, b"Resources")
            .and_then(|obj| resolve_dict(&self.document, obj))
            .cloned()
            .unwrap_or_default()
    }

    pub fn inner(&self) -> &Document {
        &self.document
    }

    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    // -- Output ---------------------------------------------------------------

    /// Write the document to `path`.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.document.save(path.as_ref()).map_err(|err| {
            BlattwerkError::PdfError(format!("failed to save {}: {}", path.as_ref().display(), err))
        })?;
        debug!(pages = self.page_count(), "PDF saved");
        Ok(())
    }

    /// Serialise the document to bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| BlattwerkError::PdfError(format!("failed to serialise PDF: {}", err)))?;
        Ok(output)
    }

    /// Flate-compress every stream, content streams included.
    #[instrument(skip(self))]
    pub fn compress(&mut self) {
        self.document.compress();
        info!(objects = self.document.objects.len(), "Streams compressed");
    }

    /// Record the current time as `/ModDate` in the document information
    /// dictionary, creating the dictionary if needed.
    pub fn touch_modified(&mut self) {
        let now = super::annotations::pdf_now();
        let info_id = self
            .document
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok();
        if let Some(info) = info_id.and_then(|id| self.document.get_dictionary_mut(id).ok()) {
            info.set("ModDate", now);
            return;
        }
        let info_id = self.document.add_object(dictionary! {
            "Producer" => Object::string_literal("blattwerk"),
            "ModDate" => now,
        });
        self.document.trailer.set("Info", info_id);
    }

    // -- Page copies ----------------------------------------------------------

    /// A new document holding copies of the given 1-based pages, in the given
    /// order. Duplicates are copied again; out-of-range indices are skipped.
    #[instrument(skip(self), fields(requested = pages.len()))]
    pub fn subset(&self, pages: &[u32]) -> Result<PdfDocument> {
        let source_pages = self.document.get_pages();
        let mut target = PdfDocument::new();

        for &page in pages {
            match source_pages.get(&page) {
                Some(&page_id) => {
                    clone_page_into(&self.document, &mut target.document, page_id)?;
                }
                None => warn!(page, page_count = source_pages.len(), "Skipping out-of-range page"),
            }
        }

        debug!(pages = target.page_count(), "Subset built");
        Ok(target)
    }

    /// Append copies of every page of `other`.
    pub fn append(&mut self, other: &PdfDocument) -> Result<()> {
        for page_id in other.page_ids() {
            clone_page_into(&other.document, &mut self.document, page_id)?;
        }
        Ok(())
    }

    /// Concatenate documents in order into a new one.
    #[instrument(skip_all, fields(documents = docs.len()))]
    pub fn merge(docs: &[PdfDocument]) -> Result<PdfDocument> {
        let mut merged = PdfDocument::new();
        for doc in docs {
            merged.append(doc)?;
        }
        info!(pages = merged.page_count(), "Merge complete");
        Ok(merged)
    }

    /// Append an empty page of the given size.
    pub fn append_blank_page(&mut self, size: PageSize) -> Result<ObjectId> {
        let pages_id = pages_root(&self.document)?;
        let contents_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(size.width),
                Object::Real(size.height),
            ],
            "Resources" => Dictionary::new(),
            "Contents" => contents_id,
        });
        push_kid(&mut self.document, pages_id, page_id)?;
        Ok(page_id)
    }

    // -- Page attributes ------------------------------------------------------

    /// Add `degrees` (a multiple of 90) to every page's `/Rotate`, keeping the
    /// result in `[0, 360)`.
    #[instrument(skip(self))]
    pub fn rotate(&mut self, degrees: i32) -> Result<()> {
        if degrees % 90 != 0 {
            return Err(BlattwerkError::Parse(format!(
                "rotation must be a multiple of 90, got {}",
                degrees
            )));
        }

        for page_id in self.page_ids() {
            let existing_rotation = self
                .inherited_attribute(page_id, b"Rotate")
                .and_then(|obj| obj.as_i64().ok())
                .unwrap_or(0) as i32;
            let new_rotation = (existing_rotation + degrees).rem_euclid(360);

            if let Ok(Object::Dictionary(dict)) = self.document.get_object_mut(page_id) {
                dict.set("Rotate", Object::Integer(new_rotation as i64));
            }
            debug!(?page_id, existing_rotation, new_rotation, "Page rotated");
        }
        Ok(())
    }

    /// Set the visible area of a 1-based page. `rect` is in caller space
    /// (top-left origin).
    pub fn set_cropbox(&mut self, page: u32, rect: Rect) -> Result<()> {
        let page_id = self.page_id(page)?;
        let [x0, y0, x1, y1] = self.geometry(page_id).rect_to_user(rect);
        let page_dict = self.page_dict_mut(page_id)?;
        page_dict.set(
            "CropBox",
            vec![
                Object::Real(x0),
                Object::Real(y0),
                Object::Real(x1),
                Object::Real(y1),
            ],
        );
        Ok(())
    }

    pub(crate) fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary> {
        self.document
            .get_dictionary(page_id)
            .map_err(|err| BlattwerkError::PdfError(format!("cannot read page {:?}: {}", page_id, err)))
    }

    pub(crate) fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        match self.document.get_object_mut(page_id) {
            Ok(Object::Dictionary(dict)) => Ok(dict),
            Ok(_) => Err(BlattwerkError::PdfError(format!(
                "page {:?} is not a dictionary",
                page_id
            ))),
            Err(err) => Err(BlattwerkError::PdfError(format!(
                "cannot read page {:?}: {}",
                page_id, err
            ))),
        }
    }

    // -- Content streams ------------------------------------------------------

    /// Decode the page's content (all content streams concatenated).
    pub(crate) fn page_content(&self, page_id: ObjectId) -> Result<Content> {
        // A page without /Contents is blank.
        if self.page_dict(page_id)?.get(b"Contents").is_err() {
            return Ok(Content { operations: Vec::new() });
        }
        // Streams split a page at token boundaries, so join them with
        // whitespace rather than raw concatenation.
        let mut raw = Vec::new();
        for stream_id in self.document.get_page_contents(page_id) {
            let stream = self
                .document
                .get_object(stream_id)
                .and_then(Object::as_stream)
                .map_err(|err| {
                    BlattwerkError::PdfError(format!(
                        "cannot read content of {:?}: {}",
                        page_id, err
                    ))
                })?;
            match stream.decompressed_content() {
                Ok(data) => raw.extend_from_slice(&data),
                Err(_) => raw.extend_from_slice(&stream.content),
            }
            raw.push(b'\n');
        }
        Content::decode(&raw).map_err(|err| {
            BlattwerkError::PdfError(format!("cannot parse content of {:?}: {}", page_id, err))
        })
    }

    /// Replace the page's content with a single new stream.
    pub(crate) fn set_page_content(&mut self, page_id: ObjectId, content: Content) -> Result<()> {
        let bytes = encode_content(content)?;
        let stream_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), bytes));
        self.page_dict_mut(page_id)?.set("Contents", stream_id);
        Ok(())
    }

    /// Paint `operations` on top of the existing page content. The existing
    /// streams are left byte-identical and wrapped in `q`/`Q` so their
    /// graphics state cannot leak into the overlay.
    pub(crate) fn append_content(&mut self, page_id: ObjectId, operations: Vec<Operation>) -> Result<()> {
        let existing: Vec<Object> = match self.page_dict(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let overlay = encode_content(Content { operations })?;
        let mut contents = Vec::with_capacity(existing.len() + 2);
        if existing.is_empty() {
            contents.push(Object::Reference(
                self.document
                    .add_object(Stream::new(Dictionary::new(), overlay)),
            ));
        } else {
            let mut suffix = b"\nQ\n".to_vec();
            suffix.extend_from_slice(&overlay);
            contents.push(Object::Reference(
                self.document
                    .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec())),
            ));
            contents.extend(existing);
            contents.push(Object::Reference(
                self.document.add_object(Stream::new(Dictionary::new(), suffix)),
            ));
        }

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// Drop objects no longer reachable from the trailer, such as content
    /// streams replaced by [`PdfDocument::set_page_content`].
    pub(crate) fn prune(&mut self) {
        let removed = self.document.prune_objects();
        debug!(removed = removed.len(), "Unreachable objects pruned");
    }

    // -- Resources ------------------------------------------------------------

    /// Register `value` under a fresh `prefix<n>` name in the page's
    /// `category` resource dictionary (`Font`, `XObject`, `ExtGState`) and
    /// return the name. A reference already registered is reused.
    pub(crate) fn add_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        prefix: &str,
        value: Object,
    ) -> Result<Vec<u8>> {
        let resources = self.resources(page_id);
        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|obj| resolve_dict(&self.document, obj))
            .cloned()
            .unwrap_or_default();

        if let Object::Reference(wanted) = value {
            let existing = entries.iter().find_map(|(name, obj)| match obj {
                Object::Reference(id) if *id == wanted => Some(name.clone()),
                _ => None,
            });
            if let Some(name) = existing {
                return Ok(name);
            }
        }

        let mut index = 1;
        let name = loop {
            let candidate = format!("{prefix}{index}").into_bytes();
            if !entries.has(&candidate) {
                break candidate;
            }
            index += 1;
        };
        entries.set(name.clone(), value);

        let own = self.page_dict(page_id)?.get(b"Resources").ok().cloned();
        match own {
            Some(Object::Reference(resources_id)) => match self.document.get_object_mut(resources_id) {
                Ok(Object::Dictionary(dict)) => dict.set(category.to_vec(), entries),
                _ => {
                    return Err(BlattwerkError::PdfError(format!(
                        "resources {:?} are not a dictionary",
                        resources_id
                    )));
                }
            },
            Some(Object::Dictionary(mut dict)) => {
                dict.set(category.to_vec(), entries);
                self.page_dict_mut(page_id)?.set("Resources", dict);
            }
            _ => {
                // Inherited (or absent): give the page its own copy.
                let mut dict = resources;
                dict.set(category.to_vec(), entries);
                self.page_dict_mut(page_id)?.set("Resources", dict);
            }
        }
        Ok(name)
    }

    /// Resource name of the built-in Helvetica (WinAnsi) font on this page.
    pub(crate) fn helvetica_font(&mut self, page_id: ObjectId) -> Result<Vec<u8>> {
        let font_id = match self.helvetica {
            Some(id) => id,
            None => {
                let id = self.document.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.helvetica = Some(id);
                id
            }
        };
        self.add_resource(page_id, b"Font", HELVETICA_PREFIX, Object::Reference(font_id))
    }

    /// Resource name of a graphics state setting fill and stroke alpha.
    pub(crate) fn alpha_state(&mut self, page_id: ObjectId, alpha: f32) -> Result<Vec<u8>> {
        let state_id = match self.alpha_states.get(&alpha.to_bits()) {
            Some(id) => *id,
            None => {
                let id = self.document.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "ca" => Object::Real(alpha),
                    "CA" => Object::Real(alpha),
                });
                self.alpha_states.insert(alpha.to_bits(), id);
                id
            }
        };
        self.add_resource(page_id, b"ExtGState", "BwGs", Object::Reference(state_id))
    }

    /// Register an image XObject on the page.
    pub(crate) fn add_xobject(&mut self, page_id: ObjectId, xobject_id: ObjectId) -> Result<Vec<u8>> {
        self.add_resource(page_id, b"XObject", "BwIm", Object::Reference(xobject_id))
    }

    // -- Annotations ----------------------------------------------------------

    /// Annotation object ids on a page, in `/Annots` order. Inline
    /// annotation dictionaries (not allowed by the format, but seen in the
    /// wild) are skipped.
    pub(crate) fn annotation_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let Ok(page) = self.page_dict(page_id) else {
            return Vec::new();
        };
        let annots = match page.get(b"Annots") {
            Ok(Object::Array(items)) => items.as_slice(),
            Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                Ok(Object::Array(items)) => items.as_slice(),
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        annots.iter().filter_map(|obj| obj.as_reference().ok()).collect()
    }

    /// Append an annotation object to the page's `/Annots`.
    pub(crate) fn push_annotation(&mut self, page_id: ObjectId, annotation: Dictionary) -> Result<ObjectId> {
        let mut annotation = annotation;
        annotation.set("P", page_id);
        let annot_id = self.document.add_object(annotation);
        let mut annots: Vec<Object> = self
            .annotation_ids(page_id)
            .into_iter()
            .map(Object::Reference)
            .collect();
        annots.push(Object::Reference(annot_id));
        self.page_dict_mut(page_id)?.set("Annots", annots);
        Ok(annot_id)
    }

    /// Remove the given annotations from the page and from the document.
    pub(crate) fn remove_annotations(&mut self, page_id: ObjectId, remove: &[ObjectId]) -> Result<()> {
        let keep: Vec<Object> = self
            .annotation_ids(page_id)
            .into_iter()
            .filter(|id| !remove.contains(id))
            .map(Object::Reference)
            .collect();
        let page = self.page_dict_mut(page_id)?;
        if keep.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", keep);
        }
        for id in remove {
            self.document.objects.remove(id);
        }
        Ok(())
    }

    /// `/Subtype` of an annotation, as text.
    pub(crate) fn annotation_subtype(&self, annot_id: ObjectId) -> Option<String> {
        self.document
            .get_dictionary(annot_id)
            .ok()
            .and_then(|dict| dict.get(b"Subtype").ok())
            .and_then(name_of)
    }
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

// -- Geometry -------------------------------------------------------------------

/// A page's MediaBox, converting between caller space (origin top-left of the
/// box, y down) and PDF user space (y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageGeometry {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageGeometry {
    pub fn from_size(size: PageSize) -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: size.width,
            y1: size.height,
        }
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.x1 - self.x0, self.y1 - self.y0)
    }

    /// Caller point to user space.
    pub fn to_user(&self, point: Point) -> (f32, f32) {
        (self.x0 + point.x, self.y1 - point.y)
    }

    /// User-space coordinates to a caller point.
    pub fn to_device(&self, x: f32, y: f32) -> Point {
        Point::new(x - self.x0, self.y1 - y)
    }

    /// Caller rectangle to a user-space `[llx, lly, urx, ury]`.
    pub fn rect_to_user(&self, rect: Rect) -> [f32; 4] {
        [
            self.x0 + rect.x0,
            self.y1 - rect.y1,
            self.x0 + rect.x1,
            self.y1 - rect.y0,
        ]
    }

    /// User-space `[llx, lly, urx, ury]` (any corner order) to a caller rectangle.
    pub fn rect_to_device(&self, rect: [f32; 4]) -> Rect {
        let a = self.to_device(rect[0], rect[1]);
        let b = self.to_device(rect[2], rect[3]);
        Rect::new(a.x, a.y, b.x, b.y)
    }
}

// -- Object helpers -------------------------------------------------------------

/// Numeric value of an Integer or Real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Text of a Name object.
pub(crate) fn name_of(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Follow references (bounded, to survive reference loops).
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..16 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Four numbers from an array object (resolving references).
pub(crate) fn rect_from_object(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let Object::Array(items) = resolve(doc, obj) else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = number(resolve(doc, item))?;
    }
    Some([
        out[0].min(out[2]),
        out[1].min(out[3]),
        out[0].max(out[2]),
        out[1].max(out[3]),
    ])
}

pub(crate) fn real_array(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

pub(crate) fn encode_content(content: Content) -> Result<Vec<u8>> {
    content
        .encode()
        .map_err(|err| BlattwerkError::PdfError(format!("failed to encode content stream: {}", err)))
}

fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    let catalog = doc
        .catalog()
        .map_err(|err| BlattwerkError::PdfError(format!("no catalog: {}", err)))?;
    match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => Ok(*id),
        Ok(_) => Err(BlattwerkError::PdfError("/Pages is not a reference".to_string())),
        Err(err) => Err(BlattwerkError::PdfError(format!("no /Pages: {}", err))),
    }
}

fn push_kid(doc: &mut Document, pages_id: ObjectId, page_id: ObjectId) -> Result<()> {
    match doc.get_object_mut(pages_id) {
        Ok(Object::Dictionary(pages_dict)) => {
            if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
                kids.push(Object::Reference(page_id));
            } else {
                pages_dict.set("Kids", vec![Object::Reference(page_id)]);
            }
            let count = pages_dict
                .get(b"Count")
                .ok()
                .and_then(|obj| obj.as_i64().ok())
                .unwrap_or(0);
            pages_dict.set("Count", Object::Integer(count + 1));
            Ok(())
        }
        _ => Err(BlattwerkError::PdfError(format!(
            "page tree root {:?} is not a dictionary",
            pages_id
        ))),
    }
}

// -- Page cloning ---------------------------------------------------------------

/// Copy a page (and everything it references) from `source` into `target`,
/// appending it as the last page. Inherited attributes are materialised on
/// the copy so it no longer depends on the source page tree.
pub(crate) fn clone_page_into(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<ObjectId> {
    let pages_id = pages_root(target)?;
    let page = source.get_dictionary(page_id).map_err(|err| {
        BlattwerkError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
    })?;

    let new_page_id = target.new_object_id();
    let mut cloner = Cloner {
        source,
        memo: HashMap::from([(page_id, new_page_id)]),
    };

    let mut new_page = Dictionary::new();
    for (key, value) in page.iter() {
        if key == b"Parent" {
            continue;
        }
        new_page.set(key.clone(), cloner.clone_object(target, value));
    }
    for key in INHERITABLE {
        if new_page.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(source, page_id, key) {
            new_page.set(key.to_vec(), cloner.clone_object(target, value));
        }
    }
    new_page.set("Parent", pages_id);

    target.objects.insert(new_page_id, Object::Dictionary(new_page));
    push_kid(target, pages_id, new_page_id)?;
    Ok(new_page_id)
}

/// Deep copy of an object graph between documents. Each source object is
/// copied at most once per page; references to other pages become Null.
struct Cloner<'a> {
    source: &'a Document,
    memo: HashMap<ObjectId, ObjectId>,
}

impl Cloner<'_> {
    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(ref_id) => self.clone_reference(target, *ref_id),
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dict(target, dict)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.clone_object(target, item)).collect())
            }
            Object::Stream(stream) => {
                let dict = self.clone_dict(target, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn clone_dict(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.clone_object(target, value));
        }
        copy
    }

    fn clone_reference(&mut self, target: &mut Document, ref_id: ObjectId) -> Object {
        if let Some(new_id) = self.memo.get(&ref_id) {
            return Object::Reference(*new_id);
        }
        let referenced = match self.source.get_object(ref_id) {
            Ok(obj) => obj,
            Err(err) => {
                warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                return Object::Null;
            }
        };
        if is_page_tree_node(referenced) {
            // Links into other pages are not carried over.
            return Object::Null;
        }

        let new_id = target.new_object_id();
        self.memo.insert(ref_id, new_id);
        let copy = self.clone_object(target, referenced);
        target.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}

fn is_page_tree_node(obj: &Object) -> bool {
    match obj {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"Page" || name == b"Pages"
        ),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A document with one Helvetica text line per page, each line drawn at
    /// `(72, 700)` in user space on a 612x792 page.
    pub(crate) fn text_pdf(pages: &[&[&str]]) -> PdfDocument {
        let mut doc = PdfDocument::new();
        let font_id = doc.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.document.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let pages_id = pages_root(&doc.document).unwrap();

        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("TL", vec![Object::Integer(14)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
            ];
            for (i, line) in lines.iter().enumerate() {
                if i > 0 {
                    operations.push(Operation::new("T*", vec![]));
                }
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            }
            operations.push(Operation::new("ET", vec![]));
            let content = Content { operations }.encode().unwrap();
            let content_id = doc.document.add_object(Stream::new(Dictionary::new(), content));
            let page_id = doc.document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            push_kid(&mut doc.document, pages_id, page_id).unwrap();
        }
        doc
    }

    /// Draw `text` on a 1-based page through a Form XObject with its own
    /// Helvetica resource. The form's matrix moves its content `drop` points
    /// below the fixture's `(72, 700)` baseline.
    pub(crate) fn text_form(doc: &mut PdfDocument, page: u32, text: &str, drop: f32) -> ObjectId {
        let font_id = doc.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F9".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        }
        .encode()
        .unwrap();
        let form_id = doc.document.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), Object::Real(-drop)],
                "Resources" => dictionary! { "Font" => dictionary! { "F9" => font_id } },
            },
            content,
        ));
        let page_id = doc.page_id(page).unwrap();
        let name = doc.add_xobject(page_id, form_id).unwrap();
        doc.append_content(page_id, vec![Operation::new("Do", vec![Object::Name(name)])])
            .unwrap();
        form_id
    }

    #[test]
    fn new_document_has_no_pages() {
        let mut doc = PdfDocument::new();
        assert_eq!(doc.page_count(), 0);
        let bytes = doc.to_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn page_id_is_strict() {
        let doc = text_pdf(&[&["a"], &["b"]]);
        assert!(doc.page_id(2).is_ok());
        assert!(matches!(
            doc.page_id(3),
            Err(BlattwerkError::PageOutOfRange { page: 3, page_count: 2 })
        ));
    }

    #[test]
    fn subset_copies_pages_in_order_and_skips_out_of_range() {
        let doc = text_pdf(&[&["one"], &["two"], &["three"]]);
        let mut subset = doc.subset(&[3, 1, 9, 3]).unwrap();
        assert_eq!(subset.page_count(), 3);

        let bytes = subset.to_bytes().unwrap();
        let reloaded = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.page_count(), 3);
    }

    #[test]
    fn subset_materialises_inherited_media_box() {
        let mut doc = text_pdf(&[&["x"]]);
        let page_id = doc.page_ids()[0];
        let pages_id = pages_root(&doc.document).unwrap();
        doc.page_dict_mut(page_id).unwrap().remove(b"MediaBox");
        if let Ok(Object::Dictionary(root)) = doc.document.get_object_mut(pages_id) {
            root.set("MediaBox", vec![0.into(), 0.into(), 300.into(), 400.into()]);
        }

        let copy = doc.subset(&[1]).unwrap();
        let copied_id = copy.page_ids()[0];
        assert!(copy.page_dict(copied_id).unwrap().has(b"MediaBox"));
        assert_eq!(copy.page_size(1).unwrap(), PageSize::new(300.0, 400.0));
    }

    #[test]
    fn clone_survives_annotation_back_reference() {
        let mut doc = text_pdf(&[&["x"]]);
        let page_id = doc.page_ids()[0];
        doc.push_annotation(
            page_id,
            dictionary! { "Type" => "Annot", "Subtype" => "Text", "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()] },
        )
        .unwrap();

        let copy = doc.subset(&[1]).unwrap();
        let new_page = copy.page_ids()[0];
        let annots = copy.annotation_ids(new_page);
        assert_eq!(annots.len(), 1);
        let annot = copy.inner().get_dictionary(annots[0]).unwrap();
        assert_eq!(annot.get(b"P").unwrap().as_reference().unwrap(), new_page);
    }

    #[test]
    fn merge_concatenates_page_counts() {
        let a = text_pdf(&[&["a1"], &["a2"]]);
        let b = text_pdf(&[&["b1"]]);
        let merged = PdfDocument::merge(&[a, b]).unwrap();
        assert_eq!(merged.page_count(), 3);
    }

    #[test]
    fn rotate_normalises_and_rejects_odd_angles() {
        let mut doc = text_pdf(&[&["x"]]);
        doc.rotate(-90).unwrap();
        let page_id = doc.page_ids()[0];
        let rotation = doc.page_dict(page_id).unwrap().get(b"Rotate").unwrap().as_i64().unwrap();
        assert_eq!(rotation, 270);
        assert!(matches!(doc.rotate(45), Err(BlattwerkError::Parse(_))));
    }

    #[test]
    fn cropbox_is_flipped_into_user_space() {
        let mut doc = text_pdf(&[&["x"]]);
        doc.set_cropbox(1, Rect::new(10.0, 20.0, 300.0, 400.0)).unwrap();
        let page_id = doc.page_ids()[0];
        let crop = rect_from_object(doc.inner(), doc.page_dict(page_id).unwrap().get(b"CropBox").unwrap()).unwrap();
        assert_eq!(crop, [10.0, 392.0, 300.0, 772.0]);
    }

    #[test]
    fn resources_are_named_uniquely_and_reused() {
        let mut doc = text_pdf(&[&["x"]]);
        let page_id = doc.page_ids()[0];
        let first = doc.helvetica_font(page_id).unwrap();
        let second = doc.helvetica_font(page_id).unwrap();
        assert_eq!(first, b"BwHelv1".to_vec());
        assert_eq!(first, second);
        let fonts = doc.resources(page_id);
        let fonts = resolve_dict(doc.inner(), fonts.get(b"Font").unwrap()).unwrap().clone();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"BwHelv1"));
    }

    #[test]
    fn append_content_wraps_existing_streams() {
        let mut doc = text_pdf(&[&["x"]]);
        let page_id = doc.page_ids()[0];
        doc.append_content(page_id, vec![Operation::new("n", vec![])]).unwrap();
        let content = doc.page_content(page_id).unwrap();
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(ops.first(), Some(&"q"));
        assert_eq!(ops.last(), Some(&"n"));
        assert!(ops.contains(&"Q"));
    }

    #[test]
    fn blank_page_takes_requested_size() {
        let mut doc = PdfDocument::new();
        doc.append_blank_page(PageSize::new(200.0, 100.0)).unwrap();
        assert_eq!(doc.page_size(1).unwrap(), PageSize::new(200.0, 100.0));
    }

    #[test]
    fn geometry_round_trips_points() {
        let geometry = PageGeometry { x0: 10.0, y0: 20.0, x1: 610.0, y1: 820.0 };
        let (x, y) = geometry.to_user(Point::new(50.0, 30.0));
        assert_eq!((x, y), (60.0, 790.0));
        assert_eq!(geometry.to_device(x, y), Point::new(50.0, 30.0));
    }
}
