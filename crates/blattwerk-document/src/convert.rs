// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format conversions. PDF to page images and plain text are done in-process;
// PDF to office formats and web pages to PDF are delegated to LibreOffice and
// wkhtmltopdf, whose absence is reported as `ExternalToolMissing`.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use blattwerk_core::config::AppConfig;
use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::OfficeFormat;
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::PdfDocument;
use crate::render::Rasterizer;

const SOFFICE_HINT: &str = "install LibreOffice and make sure `soffice` is on PATH \
     (or set `office_converter` in the config)";
const WKHTMLTOPDF_HINT: &str = "download it from https://wkhtmltopdf.org/downloads.html \
     and add it to PATH (or set `wkhtmltopdf_path` in the config)";

/// Run an external program to completion. A binary that cannot be found is
/// `ExternalToolMissing`; a non-zero exit is `ExternalTool`.
fn run_tool<I, S>(program: &Path, tool: &str, hint: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program).args(args).output().map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            BlattwerkError::ExternalToolMissing {
                tool: tool.to_owned(),
                hint: hint.to_owned(),
            }
        } else {
            BlattwerkError::ExternalTool(format!("{tool} could not be started: {err}"))
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(tool, status = %output.status, "External tool failed");
        return Err(BlattwerkError::ExternalTool(format!(
            "{tool} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    debug!(tool, "External tool finished");
    Ok(output)
}

/// Convert a PDF to DOCX or PPTX through LibreOffice, writing `output`.
#[instrument(skip_all, fields(input = %input.display(), output = %output.display(), ?format))]
pub fn convert_to_office(
    input: &Path,
    output: &Path,
    format: OfficeFormat,
    config: &AppConfig,
) -> Result<PathBuf> {
    let outdir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let infilter = format!("--infilter={}", format.import_filter());
    run_tool(
        &config.office_converter,
        "soffice",
        SOFFICE_HINT,
        [
            OsStr::new("--headless"),
            OsStr::new(&infilter),
            OsStr::new("--convert-to"),
            OsStr::new(format.extension()),
            OsStr::new("--outdir"),
            outdir.as_os_str(),
            input.as_os_str(),
        ],
    )?;

    // LibreOffice names the result after the input file.
    let stem = input
        .file_stem()
        .ok_or_else(|| BlattwerkError::Parse(format!("{} has no file name", input.display())))?;
    let produced = outdir.join(format!("{}.{}", stem.to_string_lossy(), format.extension()));
    if produced != output {
        std::fs::rename(&produced, output)?;
    }
    info!(format = format.extension(), "Office conversion complete");
    Ok(output.to_path_buf())
}

/// Render a web page to PDF through wkhtmltopdf.
#[instrument(skip_all, fields(%url, output = %output.display()))]
pub fn url_to_pdf(url: &str, output: &Path, config: &AppConfig) -> Result<PathBuf> {
    let program = config
        .wkhtmltopdf_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("wkhtmltopdf"));
    run_tool(
        &program,
        "wkhtmltopdf",
        WKHTMLTOPDF_HINT,
        [OsStr::new(url), output.as_os_str()],
    )?;
    info!(url, "Web page converted");
    Ok(output.to_path_buf())
}

/// Rasterise every page into `dir` as `page_{n}.jpg` (1-based).
#[instrument(skip_all, fields(pages = doc.page_count(), dir = %dir.display(), zoom = zoom))]
pub fn pdf_to_images(
    doc: &PdfDocument,
    dir: &Path,
    zoom: f32,
    quality: u8,
    rasterizer: &dyn Rasterizer,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(doc.page_count() as usize);
    for page in 1..=doc.page_count() {
        let bitmap = rasterizer.render_page(doc, page, zoom)?;
        let jpeg = ImageProcessor::from_dynamic(bitmap).to_jpeg_bytes(quality)?;
        let path = dir.join(format!("page_{page}.jpg"));
        std::fs::write(&path, jpeg)?;
        paths.push(path);
    }
    info!(images = paths.len(), "Pages exported as images");
    Ok(paths)
}

/// Plain text of the whole document, one page per chunk separated by a
/// newline.
pub fn extract_text(doc: &PdfDocument) -> Result<String> {
    let pages = (1..=doc.page_count())
        .map(|page| doc.page_text(page))
        .collect::<Result<Vec<_>>>()?;
    Ok(pages.join("\n"))
}
