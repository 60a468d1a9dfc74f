// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-document: document operations for Blattwerk.
//
// Provides a PDF document handle with page-order operations (reorder, extract,
// booklet imposition), overlays (stamps, page numbers, watermarks, batch
// annotations), glyph-level text search feeding redaction, replacement and
// highlighting, PII redaction, comparison, password protection, form filling,
// page rasterisation, a simulated-scan pipeline, and a path-based operation
// surface over all of them.

pub mod convert;
pub mod image;
pub mod ops;
pub mod pdf;
pub mod render;
pub mod scan;

// Re-export the primary types so callers can use `blattwerk_document::PdfDocument` etc.
pub use image::processor::ImageProcessor;
pub use pdf::document::PdfDocument;
pub use pdf::overlay::{PageNumberOptions, StampOptions, WatermarkOptions};
pub use pdf::pii::PiiPatterns;
pub use render::{GreekingRasterizer, Rasterizer, default_rasterizer};
pub use scan::fake::{FakeScanOptions, fake_scan};

#[cfg(feature = "pdfium")]
pub use render::pdfium::PdfiumRasterizer;
