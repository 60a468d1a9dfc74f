// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: the document handle and every page-level operation on it.

pub mod annotations;
pub mod compare;
pub mod document;
pub mod fonts;
pub mod forms;
pub mod overlay;
pub mod pages;
pub mod pii;
pub mod redact;
pub mod security;
pub mod text;
pub mod writer;

pub use annotations::AnnotationInfo;
pub use compare::{DiffLine, DiffTag, diff_lines};
pub use document::PdfDocument;
pub use forms::FormField;
pub use overlay::{PageNumberOptions, StampOptions, WatermarkOptions};
pub use pages::{booklet_order, parse_page_order, parse_page_set};
pub use pii::PiiPatterns;
pub use text::{Glyph, PageText, TextLine};
pub use writer::{JpegPage, images_to_pdf, jpeg_pages_to_pdf};
