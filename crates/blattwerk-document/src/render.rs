// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterisation. The built-in rasteriser draws every glyph as a solid
// box at its laid-out position ("greeking"), which is enough for scan
// simulation and thumbnails. With the `pdfium` feature, pages are rendered
// by the PDFium library instead.

use blattwerk_core::error::{BlattwerkError, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use tracing::{debug, instrument};

use crate::pdf::PdfDocument;

/// Ink colour of greeked glyphs.
const GLYPH_INK: Rgb<u8> = Rgb([40, 40, 40]);
/// Longest bitmap side, in pixels, the greeking rasteriser will allocate.
pub const MAX_RASTER_SIDE: u32 = 20_000;

/// Turns pages into bitmaps.
pub trait Rasterizer {
    /// Render a 1-based page at `zoom` pixels per point.
    fn render_page(&self, doc: &PdfDocument, page: u32, zoom: f32) -> Result<DynamicImage>;

    /// Render every page in order.
    fn render_all(&self, doc: &PdfDocument, zoom: f32) -> Result<Vec<DynamicImage>> {
        (1..=doc.page_count())
            .map(|page| self.render_page(doc, page, zoom))
            .collect()
    }
}

/// Draws glyph boxes on a white page.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreekingRasterizer;

impl Rasterizer for GreekingRasterizer {
    #[instrument(skip(self, doc))]
    fn render_page(&self, doc: &PdfDocument, page: u32, zoom: f32) -> Result<DynamicImage> {
        let size = doc.page_size(page)?;
        let (width, height) = (size.width * zoom, size.height * zoom);
        let limit = MAX_RASTER_SIDE as f32;
        if !zoom.is_finite() || zoom <= 0.0 || width > limit || height > limit {
            return Err(BlattwerkError::Parse(format!(
                "zoom {zoom} gives a {width:.0}x{height:.0} bitmap for page {page}, \
                 sides must be positive and at most {MAX_RASTER_SIDE} px"
            )));
        }
        let width = width.round().max(1.0) as u32;
        let height = height.round().max(1.0) as u32;
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        let layout = doc.text_layout(page)?;
        let mut drawn = 0;
        for glyph in layout.glyphs.iter().filter(|g| !g.text.trim().is_empty()) {
            let x = (glyph.bbox.x0 * zoom).floor() as i32;
            let y = (glyph.bbox.y0 * zoom).floor() as i32;
            let w = (glyph.bbox.width() * zoom).ceil().max(1.0) as u32;
            let h = (glyph.bbox.height() * zoom).ceil().max(1.0) as u32;
            draw_filled_rect_mut(&mut canvas, PixelRect::at(x, y).of_size(w, h), GLYPH_INK);
            drawn += 1;
        }
        debug!(width, height, glyphs = drawn, "Page greeked");
        Ok(DynamicImage::ImageRgb8(canvas))
    }
}

/// The rasteriser used by the operations: PDFium when compiled in and
/// loadable, otherwise greeking.
pub fn default_rasterizer() -> Box<dyn Rasterizer> {
    #[cfg(feature = "pdfium")]
    {
        match pdfium::PdfiumRasterizer::new() {
            Ok(rasterizer) => return Box::new(rasterizer),
            Err(err) => tracing::warn!(%err, "PDFium unavailable, falling back to greeking"),
        }
    }
    Box::new(GreekingRasterizer)
}

#[cfg(feature = "pdfium")]
pub mod pdfium {
    use blattwerk_core::error::{BlattwerkError, Result};
    use image::DynamicImage;
    use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
    use tracing::debug;

    use super::Rasterizer;
    use crate::pdf::PdfDocument;

    /// Renders through a dynamically bound PDFium library.
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        /// Bind PDFium from the working directory or the system library path.
        pub fn new() -> Result<Self> {
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|err| BlattwerkError::ExternalToolMissing {
                    tool: "pdfium".into(),
                    hint: format!("install the PDFium shared library ({err})"),
                })?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }

        fn render(&self, doc: &PdfDocument, pages: &[u32], zoom: f32) -> Result<Vec<DynamicImage>> {
            let mut bytes = Vec::new();
            doc.inner()
                .clone()
                .save_to(&mut bytes)
                .map_err(|err| BlattwerkError::PdfError(format!("failed to serialise PDF: {err}")))?;
            let document = self
                .pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|err| BlattwerkError::PdfError(format!("PDFium could not load document: {err}")))?;
            let config = PdfRenderConfig::new().scale_page_by_factor(zoom);

            pages
                .iter()
                .map(|&page| {
                    let index = u16::try_from(page.saturating_sub(1)).unwrap_or(u16::MAX);
                    let pdf_page = document
                        .pages()
                        .get(index)
                        .map_err(|err| BlattwerkError::PdfError(format!("page {page}: {err}")))?;
                    let bitmap = pdf_page
                        .render_with_config(&config)
                        .map_err(|err| BlattwerkError::PdfError(format!("render page {page}: {err}")))?;
                    debug!(page, "Page rendered by PDFium");
                    Ok(bitmap.as_image())
                })
                .collect()
        }
    }

    impl Rasterizer for PdfiumRasterizer {
        fn render_page(&self, doc: &PdfDocument, page: u32, zoom: f32) -> Result<DynamicImage> {
            doc.page_id(page)?;
            let mut images = self.render(doc, &[page], zoom)?;
            images
                .pop()
                .ok_or_else(|| BlattwerkError::PdfError(format!("page {page} produced no image")))
        }

        fn render_all(&self, doc: &PdfDocument, zoom: f32) -> Result<Vec<DynamicImage>> {
            let pages: Vec<u32> = (1..=doc.page_count()).collect();
            self.render(doc, &pages, zoom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::text_pdf;

    #[test]
    fn greeking_scales_page_and_inks_glyphs() {
        let doc = text_pdf(&[&["Hello"]]);
        let image = GreekingRasterizer.render_page(&doc, 1, 2.0).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (1224, 1584));

        // Inside the "H" box: x 72..80.7, y 82.4..94.4 at zoom 1.
        assert_eq!(*image.get_pixel(150, 180), GLYPH_INK);
        assert_eq!(*image.get_pixel(10, 10), Rgb([255, 255, 255]));
    }

    #[test]
    fn render_all_yields_one_image_per_page() {
        let doc = text_pdf(&[&["a"], &["b"], &["c"]]);
        assert_eq!(GreekingRasterizer.render_all(&doc, 1.0).unwrap().len(), 3);
    }

    #[test]
    fn oversized_or_degenerate_zoom_is_rejected() {
        let doc = text_pdf(&[&["a"]]);
        assert!(matches!(
            GreekingRasterizer.render_page(&doc, 1, 1.0e6),
            Err(BlattwerkError::Parse(_))
        ));
        assert!(GreekingRasterizer.render_page(&doc, 1, f32::INFINITY).is_err());
        assert!(GreekingRasterizer.render_page(&doc, 1, 0.0).is_err());
        assert!(GreekingRasterizer.render_page(&doc, 1, -1.0).is_err());
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let doc = text_pdf(&[&["a"]]);
        assert!(GreekingRasterizer.render_page(&doc, 2, 1.0).is_err());
    }
}
