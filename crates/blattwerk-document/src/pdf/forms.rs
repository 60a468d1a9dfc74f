// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive form fields: list the AcroForm field tree and fill values.

use std::collections::HashMap;

use blattwerk_core::error::{BlattwerkError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::document::{PdfDocument, name_of, resolve, resolve_dict};

/// Field tree depth limit.
const MAX_DEPTH: usize = 32;

/// A terminal form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    /// Fully qualified name: partial names joined with `.`.
    pub name: String,
    /// `/FT` (`Tx`, `Btn`, `Ch`, `Sig`), inherited from ancestors.
    pub field_type: Option<String>,
    pub value: Option<String>,
    #[serde(skip)]
    id: ObjectId,
}

/// Text of a PDF text string: UTF-16BE with a byte order mark, otherwise
/// one byte per character.
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn field_value(doc: &Document, field: &Dictionary) -> Option<String> {
    match resolve(doc, field.get(b"V").ok()?) {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        other => name_of(other),
    }
}

fn field_kids(field: &Dictionary) -> Vec<ObjectId> {
    match field.get(b"Kids") {
        Ok(Object::Array(kids)) => kids.iter().filter_map(|kid| kid.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

fn collect_fields(
    doc: &Document,
    id: ObjectId,
    parent: Option<&str>,
    inherited_type: Option<String>,
    depth: usize,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_DEPTH {
        warn!(?id, "Form field tree too deep");
        return;
    }
    let Ok(field) = doc.get_dictionary(id) else {
        return;
    };
    let partial = match field.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(decode_text(bytes)),
        _ => None,
    };
    let name = match (parent, partial) {
        (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => return,
    };
    let field_type = field
        .get(b"FT")
        .ok()
        .and_then(name_of)
        .or(inherited_type);

    // Kids with their own /T are sub-fields; the others are widgets.
    let sub_fields: Vec<ObjectId> = field_kids(field)
        .into_iter()
        .filter(|kid| doc.get_dictionary(*kid).map(|k| k.has(b"T")).unwrap_or(false))
        .collect();
    if sub_fields.is_empty() {
        out.push(FormField {
            name,
            field_type,
            value: field_value(doc, field),
            id,
        });
        return;
    }
    for kid in sub_fields {
        collect_fields(doc, kid, Some(&name), field_type.clone(), depth + 1, out);
    }
}

/// Appearance states a widget offers (`/AP /N` keys).
fn appearance_states(doc: &Document, widget: &Dictionary) -> Vec<Vec<u8>> {
    widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve_dict(doc, ap))
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|normal| resolve_dict(doc, normal))
        .map(|normal| normal.iter().map(|(key, _)| key.clone()).collect())
        .unwrap_or_default()
}

impl PdfDocument {
    /// The document's AcroForm dictionary, if any.
    fn acro_form(&self) -> Option<&Dictionary> {
        let catalog = self.inner().catalog().ok()?;
        resolve_dict(self.inner(), catalog.get(b"AcroForm").ok()?)
    }

    /// Every terminal form field with its fully qualified name.
    pub fn widgets(&self) -> Vec<FormField> {
        let mut fields = Vec::new();
        let Some(form) = self.acro_form() else {
            return fields;
        };
        let roots: Vec<ObjectId> = match form.get(b"Fields").map(|f| resolve(self.inner(), f)) {
            Ok(Object::Array(items)) => items.iter().filter_map(|i| i.as_reference().ok()).collect(),
            _ => Vec::new(),
        };
        for root in roots {
            collect_fields(self.inner(), root, None, None, 0, &mut fields);
        }
        fields
    }

    /// Set field values by fully qualified name. Button fields take the value
    /// as a state name (`/V` and each widget's `/AS`). Viewers are asked to
    /// regenerate appearances. Returns the number of fields set.
    #[instrument(skip_all, fields(values = values.len()))]
    pub fn fill_form(&mut self, values: &HashMap<String, String>) -> Result<usize> {
        let fields = self.widgets();
        if fields.is_empty() {
            warn!("Document has no form fields");
            return Ok(0);
        }

        let mut filled = 0;
        for field in &fields {
            let Some(value) = values.get(&field.name) else {
                continue;
            };
            let is_button = field.field_type.as_deref() == Some("Btn");
            self.set_field_value(field.id, value, is_button)?;
            debug!(field = field.name.as_str(), "Field filled");
            filled += 1;
        }

        for name in values.keys() {
            if !fields.iter().any(|f| &f.name == name) {
                warn!(field = name.as_str(), "No such form field");
            }
        }

        self.set_need_appearances()?;
        info!(filled, "Form filled");
        Ok(filled)
    }

    fn set_field_value(&mut self, id: ObjectId, value: &str, is_button: bool) -> Result<()> {
        let doc = self.inner();
        let field = doc
            .get_dictionary(id)
            .map_err(|err| BlattwerkError::PdfError(format!("form field {id:?}: {err}")))?;

        // The field itself may double as its only widget.
        let mut widgets: Vec<(ObjectId, Vec<Vec<u8>>)> = Vec::new();
        if is_button {
            if field.has(b"Rect") || field.has(b"AP") {
                widgets.push((id, appearance_states(doc, field)));
            }
            for kid in field_kids(field) {
                if let Ok(widget) = doc.get_dictionary(kid) {
                    widgets.push((kid, appearance_states(doc, widget)));
                }
            }
        }

        let new_value = if is_button {
            Object::Name(value.as_bytes().to_vec())
        } else {
            encode_text(value)
        };
        if let Ok(Object::Dictionary(field)) = self.inner_mut().get_object_mut(id) {
            field.set("V", new_value);
        }

        for (widget_id, states) in widgets {
            let state = if states.is_empty() || states.iter().any(|s| s == value.as_bytes()) {
                value.as_bytes().to_vec()
            } else {
                b"Off".to_vec()
            };
            if let Ok(Object::Dictionary(widget)) = self.inner_mut().get_object_mut(widget_id) {
                widget.set("AS", Object::Name(state));
            }
        }
        Ok(())
    }

    fn set_need_appearances(&mut self) -> Result<()> {
        let root = self
            .inner()
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|err| BlattwerkError::PdfError(format!("no catalog: {err}")))?;
        let form_ref = self
            .inner()
            .get_dictionary(root)
            .ok()
            .and_then(|catalog| catalog.get(b"AcroForm").ok())
            .and_then(|form| form.as_reference().ok());

        match form_ref {
            Some(id) => {
                if let Ok(Object::Dictionary(form)) = self.inner_mut().get_object_mut(id) {
                    form.set("NeedAppearances", Object::Boolean(true));
                }
            }
            None => {
                if let Ok(Object::Dictionary(catalog)) = self.inner_mut().get_object_mut(root) {
                    if let Ok(Object::Dictionary(form)) = catalog.get_mut(b"AcroForm") {
                        form.set("NeedAppearances", Object::Boolean(true));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::text_pdf;
    use lopdf::dictionary;

    /// Adds a form: `name` (text), `address.city` (text under a parent) and
    /// `agree` (checkbox with On/Off appearances).
    fn form_pdf() -> PdfDocument {
        let mut doc = text_pdf(&[&["Form"]]);
        let page_id = doc.page_ids()[0];
        let inner = doc.inner_mut();

        let name = inner.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "Subtype" => "Widget",
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
            "P" => page_id,
        });
        let city = inner.add_object(dictionary! {
            "T" => Object::string_literal("city"),
            "Subtype" => "Widget",
            "Rect" => vec![0.into(), 30.into(), 100.into(), 50.into()],
        });
        let address = inner.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("address"),
            "Kids" => vec![city.into()],
        });
        let on = inner.add_object(lopdf::Stream::new(lopdf::Dictionary::new(), Vec::new()));
        let agree = inner.add_object(dictionary! {
            "FT" => "Btn",
            "T" => Object::string_literal("agree"),
            "Subtype" => "Widget",
            "Rect" => vec![0.into(), 60.into(), 10.into(), 70.into()],
            "AP" => dictionary! { "N" => dictionary! { "Yes" => on, "Off" => on } },
            "AS" => "Off",
        });
        let form = inner.add_object(dictionary! {
            "Fields" => vec![name.into(), address.into(), agree.into()],
        });
        let root = inner.trailer.get(b"Root").unwrap().as_reference().unwrap();
        if let Ok(Object::Dictionary(catalog)) = inner.get_object_mut(root) {
            catalog.set("AcroForm", form);
        }
        doc
    }

    #[test]
    fn widgets_use_qualified_names() {
        let doc = form_pdf();
        let names: Vec<String> = doc.widgets().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["name", "address.city", "agree"]);
        let city = doc.widgets().into_iter().find(|f| f.name == "address.city").unwrap();
        assert_eq!(city.field_type.as_deref(), Some("Tx"));
    }

    #[test]
    fn fill_sets_values_and_button_states() {
        let mut doc = form_pdf();
        let values: HashMap<String, String> = [
            ("name", "Ada Lovelace"),
            ("address.city", "Zürich"),
            ("agree", "Yes"),
            ("missing", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(doc.fill_form(&values).unwrap(), 3);

        let by_name: HashMap<String, Option<String>> =
            doc.widgets().into_iter().map(|f| (f.name, f.value)).collect();
        assert_eq!(by_name["name"].as_deref(), Some("Ada Lovelace"));
        assert_eq!(by_name["address.city"].as_deref(), Some("Zürich"));
        assert_eq!(by_name["agree"].as_deref(), Some("Yes"));

        let agree = doc.widgets().into_iter().find(|f| f.name == "agree").unwrap();
        let widget = doc.inner().get_dictionary(agree.id).unwrap();
        assert_eq!(widget.get(b"AS").unwrap().as_name().unwrap(), b"Yes");
        assert_eq!(
            doc.acro_form().unwrap().get(b"NeedAppearances").unwrap(),
            &Object::Boolean(true)
        );
    }

    #[test]
    fn document_without_form_fills_nothing() {
        let mut doc = text_pdf(&[&["plain"]]);
        assert!(doc.widgets().is_empty());
        let values = HashMap::from([("a".to_string(), "b".to_string())]);
        assert_eq!(doc.fill_form(&values).unwrap(), 0);
    }
}
