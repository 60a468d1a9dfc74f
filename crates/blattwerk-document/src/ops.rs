// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation surface: one function per transformation, taking input paths and
// parameters and writing the result to the given output path. Each call opens
// its own document handle and drops it on return.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use blattwerk_core::config::AppConfig;
use blattwerk_core::error::Result;
use blattwerk_core::types::{Annotation, AnnotationReport, OfficeFormat, Rgb, TextChange};
use tracing::{info, instrument};

use crate::convert;
use crate::pdf::overlay::{PageNumberOptions, StampOptions, WatermarkOptions};
use crate::pdf::pii::PiiPatterns;
use crate::pdf::{PdfDocument, writer};
use crate::render::default_rasterizer;
use crate::scan::{FakeScanOptions, fake_scan as scan_document};

/// Stamp the modification date and write `doc` to `output`.
fn finish(mut doc: PdfDocument, output: &Path) -> Result<PathBuf> {
    doc.touch_modified();
    doc.save(output)?;
    Ok(output.to_path_buf())
}

/// Open `input`, run `apply` on it, and save to `output`.
fn transform<T>(
    input: &Path,
    output: &Path,
    apply: impl FnOnce(&mut PdfDocument) -> Result<T>,
) -> Result<T> {
    let mut doc = PdfDocument::open(input)?;
    let value = apply(&mut doc)?;
    finish(doc, output)?;
    Ok(value)
}

// -- Page order ---------------------------------------------------------------

/// Concatenate `inputs` in order.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(inputs: &[PathBuf], output: &Path) -> Result<PathBuf> {
    let docs = inputs
        .iter()
        .map(PdfDocument::open)
        .collect::<Result<Vec<_>>>()?;
    finish(PdfDocument::merge(&docs)?, output)
}

/// Write every page to `out_dir` as `split_page_{n}.pdf` (1-based).
#[instrument(skip_all, fields(input = %input.display()))]
pub fn split(input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let doc = PdfDocument::open(input)?;
    let mut paths = Vec::new();
    for (i, page) in doc.split()?.into_iter().enumerate() {
        paths.push(finish(page, &out_dir.join(format!("split_page_{}.pdf", i + 1)))?);
    }
    info!(files = paths.len(), "Split complete");
    Ok(paths)
}

/// Keep exactly the pages in `order` (1-based, duplicates allowed).
pub fn reorder(input: &Path, output: &Path, order: &[u32]) -> Result<PathBuf> {
    let doc = PdfDocument::open(input)?;
    finish(doc.reorder(order)?, output)
}

/// Keep the pages named by a range spec such as `"1-3,5"`, ascending.
pub fn extract_pages(input: &Path, output: &Path, spec: &str) -> Result<PathBuf> {
    let doc = PdfDocument::open(input)?;
    finish(doc.extract_pages(spec)?, output)
}

/// Impose pages for saddle-stitch binding.
pub fn booklet(input: &Path, output: &Path) -> Result<PathBuf> {
    let doc = PdfDocument::open(input)?;
    finish(doc.booklet()?, output)
}

// -- Page attributes ----------------------------------------------------------

pub fn compress(input: &Path, output: &Path) -> Result<PathBuf> {
    transform(input, output, |doc| {
        doc.compress();
        Ok(())
    })?;
    Ok(output.to_path_buf())
}

pub fn rotate(input: &Path, output: &Path, degrees: i32) -> Result<PathBuf> {
    transform(input, output, |doc| doc.rotate(degrees))?;
    Ok(output.to_path_buf())
}

/// Crop every page to the box from `(left, top)` to `(right, bottom)` in
/// top-left coordinates; a missing edge defaults to the page's width or
/// height.
pub fn crop(
    input: &Path,
    output: &Path,
    left: f32,
    top: f32,
    right: Option<f32>,
    bottom: Option<f32>,
) -> Result<PathBuf> {
    transform(input, output, |doc| doc.crop(left, top, right, bottom))?;
    Ok(output.to_path_buf())
}

// -- Overlays -----------------------------------------------------------------

pub fn watermark(input: &Path, output: &Path, text: &str, config: &AppConfig) -> Result<PathBuf> {
    let options = WatermarkOptions {
        font_size: config.watermark_font_size,
        opacity: config.watermark_opacity,
        ..WatermarkOptions::default()
    };
    transform(input, output, |doc| doc.add_watermark(text, &options))?;
    Ok(output.to_path_buf())
}

pub fn stamp(input: &Path, output: &Path, options: &StampOptions) -> Result<PathBuf> {
    transform(input, output, |doc| doc.add_text_stamp(options))?;
    Ok(output.to_path_buf())
}

pub fn page_numbers(input: &Path, output: &Path, options: &PageNumberOptions) -> Result<PathBuf> {
    transform(input, output, |doc| doc.add_page_numbers(options))?;
    Ok(output.to_path_buf())
}

/// Apply a batch of annotations. The document is saved even when some
/// entries were skipped; the report says which.
pub fn annotate(input: &Path, output: &Path, annotations: &[Annotation]) -> Result<AnnotationReport> {
    transform(input, output, |doc| Ok(doc.annotate(annotations)))
}

// -- Text ---------------------------------------------------------------------

/// Redact every occurrence of `needle`. Returns the number of areas.
pub fn redact(input: &Path, output: &Path, needle: &str) -> Result<usize> {
    transform(input, output, |doc| doc.redact_text(needle))
}

/// Redact every occurrence of `old` and write `new` once per page where it
/// occurred.
pub fn replace(input: &Path, output: &Path, old: &str, new: &str, config: &AppConfig) -> Result<usize> {
    transform(input, output, |doc| doc.replace_text(old, new, config.replacement_font_size))
}

pub fn edit_text(
    input: &Path,
    output: &Path,
    changes: &[TextChange],
    config: &AppConfig,
) -> Result<usize> {
    transform(input, output, |doc| doc.edit_text(changes, config.replacement_font_size))
}

pub fn highlight(input: &Path, output: &Path, needle: &str, color: Rgb) -> Result<usize> {
    transform(input, output, |doc| doc.highlight_text(needle, color))
}

/// Redact matches of the named PII patterns (or ad hoc regexes).
pub fn smart_redact(
    input: &Path,
    output: &Path,
    names: &[String],
    patterns: &PiiPatterns,
) -> Result<usize> {
    transform(input, output, |doc| doc.smart_redact(names, patterns))
}

/// Highlight lines of `newer` that are new relative to `baseline`; writes
/// the highlighted copy of `newer`.
pub fn compare(baseline: &Path, newer: &Path, output: &Path) -> Result<usize> {
    let baseline = PdfDocument::open(baseline)?;
    transform(newer, output, |doc| doc.highlight_differences(&baseline))
}

/// Write the document's plain text to `output` and return it.
pub fn extract_text(input: &Path, output: &Path) -> Result<String> {
    let doc = PdfDocument::open(input)?;
    let text = convert::extract_text(&doc)?;
    std::fs::write(output, &text)?;
    Ok(text)
}

// -- Annotations and forms ----------------------------------------------------

pub fn strip_annotations(input: &Path, output: &Path) -> Result<usize> {
    transform(input, output, |doc| doc.strip_annotations())
}

/// Set form field values by fully qualified name.
pub fn fill_form(input: &Path, output: &Path, values: &HashMap<String, String>) -> Result<usize> {
    transform(input, output, |doc| doc.fill_form(values))
}

// -- Security -----------------------------------------------------------------

pub fn add_password(input: &Path, output: &Path, password: &str) -> Result<PathBuf> {
    let mut doc = PdfDocument::open(input)?;
    doc.touch_modified();
    doc.encrypt(password)?;
    doc.save(output)?;
    Ok(output.to_path_buf())
}

/// Decrypt with `password` and save without encryption. An unencrypted
/// input is simply rewritten.
pub fn remove_password(input: &Path, output: &Path, password: &str) -> Result<PathBuf> {
    let doc = PdfDocument::open_with_password(input, password)?;
    finish(doc, output)
}

// -- Conversions --------------------------------------------------------------

/// One page per image file.
#[instrument(skip_all, fields(images = images.len()))]
pub fn images_to_pdf(images: &[PathBuf], output: &Path) -> Result<PathBuf> {
    let data = images
        .iter()
        .map(std::fs::read)
        .collect::<std::io::Result<Vec<_>>>()?;
    std::fs::write(output, writer::images_to_pdf(&data)?)?;
    Ok(output.to_path_buf())
}

/// Rasterise every page into `out_dir` as `page_{n}.jpg`.
pub fn pdf_to_images(input: &Path, out_dir: &Path, config: &AppConfig) -> Result<Vec<PathBuf>> {
    let doc = PdfDocument::open(input)?;
    convert::pdf_to_images(
        &doc,
        out_dir,
        config.raster_zoom,
        config.raster_jpeg_quality,
        default_rasterizer().as_ref(),
    )
}

pub fn convert_to_office(
    input: &Path,
    output: &Path,
    format: OfficeFormat,
    config: &AppConfig,
) -> Result<PathBuf> {
    convert::convert_to_office(input, output, format, config)
}

pub fn url_to_pdf(url: &str, output: &Path, config: &AppConfig) -> Result<PathBuf> {
    convert::url_to_pdf(url, output, config)
}

/// Re-render the document as a degraded grayscale scan.
pub fn fake_scan(input: &Path, output: &Path, options: &FakeScanOptions) -> Result<PathBuf> {
    let doc = PdfDocument::open(input)?;
    let scanned = scan_document(&doc, options, default_rasterizer().as_ref())?;
    finish(scanned, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::text_pdf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, pages: &[&[&str]]) -> PathBuf {
        let path = dir.path().join(name);
        text_pdf(pages).save(&path).unwrap();
        path
    }

    fn page_texts(path: &Path) -> Vec<String> {
        let doc = PdfDocument::open(path).unwrap();
        (1..=doc.page_count()).map(|p| doc.page_text(p).unwrap()).collect()
    }

    #[test]
    fn merge_then_split_preserves_pages() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.pdf", &[&["a1"], &["a2"]]);
        let b = write(&dir, "b.pdf", &[&["b1"]]);
        let merged = merge(&[a, b], &dir.path().join("merged.pdf")).unwrap();
        assert_eq!(page_texts(&merged), vec!["a1", "a2", "b1"]);

        let parts = split(&merged, &dir.path().join("parts")).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts[2].ends_with("split_page_3.pdf"));
        assert_eq!(page_texts(&parts[1]), vec!["a2"]);
    }

    #[test]
    fn extract_and_reorder_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.pdf", &[&["p1"], &["p2"], &["p3"], &["p4"], &["p5"]]);

        let extracted = extract_pages(&input, &dir.path().join("x.pdf"), "3,1-2").unwrap();
        assert_eq!(page_texts(&extracted), vec!["p1", "p2", "p3"]);

        let reordered = reorder(&input, &dir.path().join("r.pdf"), &[5, 9, 1]).unwrap();
        assert_eq!(page_texts(&reordered), vec!["p5", "p1"]);
    }

    #[test]
    fn redact_removes_text_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.pdf", &[&["name: Alice Smith"]]);
        let output = dir.path().join("out.pdf");
        assert_eq!(redact(&input, &output, "Alice").unwrap(), 1);
        assert!(!page_texts(&output)[0].contains("Alice"));
        assert!(page_texts(&output)[0].contains("Smith"));
    }

    #[test]
    fn password_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.pdf", &[&["classified"]]);
        let locked = add_password(&input, &dir.path().join("locked.pdf"), "pw").unwrap();
        assert!(PdfDocument::open(&locked).is_err());

        let unlocked = remove_password(&locked, &dir.path().join("open.pdf"), "pw").unwrap();
        assert_eq!(page_texts(&unlocked), vec!["classified"]);
        assert!(!PdfDocument::open(&unlocked).unwrap().is_encrypted());
        assert!(remove_password(&locked, &dir.path().join("bad.pdf"), "nope").is_err());
    }

    #[test]
    fn outputs_carry_a_modification_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.pdf", &[&["x"]]);
        let output = rotate(&input, &dir.path().join("out.pdf"), 90).unwrap();
        let doc = PdfDocument::open(&output).unwrap();
        let info_id = doc.inner().trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.inner().get_dictionary(info_id).unwrap();
        let date = info.get(b"ModDate").unwrap().as_str().unwrap();
        assert!(date.starts_with(b"D:"));
    }

    #[test]
    fn extract_text_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.pdf", &[&["hello"], &["world"]]);
        let txt = dir.path().join("out.txt");
        assert_eq!(extract_text(&input, &txt).unwrap(), "hello\nworld");
        assert_eq!(std::fs::read_to_string(&txt).unwrap(), "hello\nworld");
    }

    #[test]
    fn fake_scan_by_path_keeps_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.pdf", &[&["one"], &["two"]]);
        let mut options = FakeScanOptions::seeded(1);
        options.config.zoom = 0.25;
        let output = fake_scan(&input, &dir.path().join("scan.pdf"), &options).unwrap();
        assert_eq!(PdfDocument::open(&output).unwrap().page_count(), 2);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(compress(&dir.path().join("absent.pdf"), &dir.path().join("out.pdf")).is_err());
    }
}
