// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: build new documents from images, either through `printpdf` 0.8
// (one page per picture) or directly as lopdf image XObjects.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::PageSize;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream, dictionary};
use printpdf::{
    Mm, Op, PdfDocument as PrintDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage,
    RawImageData, RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use super::document::PdfDocument;

/// Points per millimetre.
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Build a PDF with one page per image. Each page is exactly the image's
/// pixel size at 72 DPI; images are converted to RGB.
#[instrument(skip_all, fields(images = images.len()))]
pub fn images_to_pdf(images: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut doc = PrintDocument::new("Blattwerk Images");
    let mut pages: Vec<PdfPage> = Vec::with_capacity(images.len());

    for (index, bytes) in images.iter().enumerate() {
        let dynamic_image = ::image::load_from_memory(bytes).map_err(|err| {
            BlattwerkError::ImageError(format!("failed to decode image #{}: {}", index + 1, err))
        })?;

        let width = dynamic_image.width() as usize;
        let height = dynamic_image.height() as usize;
        let rgb_image = dynamic_image.to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width,
            height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = doc.add_image(&raw);

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(1.0),
                scale_y: Some(1.0),
                dpi: Some(72.0),
                rotate: None,
            },
        }];

        let page_w = Mm(width as f32 / PT_PER_MM);
        let page_h = Mm(height as f32 / PT_PER_MM);
        pages.push(PdfPage::new(page_w, page_h, ops));
        debug!(index, width, height, "Image page added");
    }

    doc.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "printpdf reported warnings");
    }

    info!(output_bytes = output.len(), "Image PDF created");
    Ok(output)
}

/// An already-encoded JPEG to be laid out as a full page.
#[derive(Debug, Clone)]
pub struct JpegPage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

/// Build a document with one page per JPEG, each page sized to the image at
/// `dpi`. The JPEG bytes are embedded unchanged (DCTDecode).
#[instrument(skip_all, fields(pages = pages.len(), dpi = dpi))]
pub fn jpeg_pages_to_pdf(pages: &[JpegPage], dpi: f32) -> Result<PdfDocument> {
    let mut doc = PdfDocument::new();

    for page in pages {
        let size = PageSize::new(
            page.width as f32 / dpi * 72.0,
            page.height as f32 / dpi * 72.0,
        );
        let page_id = doc.append_blank_page(size)?;

        let color_space = if page.grayscale { "DeviceGray" } else { "DeviceRGB" };
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(page.width as i64),
                "Height" => Object::Integer(page.height as i64),
                "ColorSpace" => color_space,
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "DCTDecode",
            },
            page.data.clone(),
        );
        stream.allows_compression = false;
        let image_id = doc.inner_mut().add_object(stream);
        let name = doc.add_xobject(page_id, image_id)?;

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(size.width),
                    0.into(),
                    0.into(),
                    Object::Real(size.height),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name)]),
            Operation::new("Q", vec![]),
        ];
        doc.set_page_content(page_id, Content { operations })?;
    }

    debug!(pages = doc.page_count(), "JPEG pages laid out");
    Ok(doc)
}

/// An RGB image XObject (Flate-compressed) with a soft mask when the image
/// has an alpha channel.
pub(crate) fn image_xobject(doc: &mut PdfDocument, image: &DynamicImage) -> Result<lopdf::ObjectId> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(width),
        "Height" => Object::Integer(height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => Object::Integer(8),
    };

    if image.color().has_alpha() {
        let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let mask_id = doc.inner_mut().add_object(compressed(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(width),
                "Height" => Object::Integer(height),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => Object::Integer(8),
            },
            alpha,
        ));
        dict.set("SMask", mask_id);
    }

    let stream = compressed(dict, image.to_rgb8().into_raw());
    Ok(doc.inner_mut().add_object(stream))
}

fn compressed(dict: Dictionary, data: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, data);
    if let Err(err) = stream.compress() {
        warn!(%err, "Image stream left uncompressed");
    }
    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, _| Rgb([(x * 10) as u8, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn one_page_per_image_at_pixel_size() {
        let bytes = images_to_pdf(&[png_bytes(100, 50), png_bytes(20, 30)]).unwrap();
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.page_count(), 2);
        let size = doc.page_size(1).unwrap();
        assert!((size.width - 100.0).abs() < 0.5, "width {}", size.width);
        assert!((size.height - 50.0).abs() < 0.5, "height {}", size.height);
    }

    #[test]
    fn undecodable_image_is_an_image_error() {
        let result = images_to_pdf(&[b"not an image".to_vec()]);
        assert!(matches!(result, Err(BlattwerkError::ImageError(_))));
    }

    #[test]
    fn jpeg_pages_use_requested_dpi() {
        let jpeg = {
            let img = DynamicImage::new_luma8(300, 150);
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
            out.into_inner()
        };
        let doc = jpeg_pages_to_pdf(
            &[JpegPage { data: jpeg, width: 300, height: 150, grayscale: true }],
            150.0,
        )
        .unwrap();
        assert_eq!(doc.page_size(1).unwrap(), PageSize::new(144.0, 72.0));
    }
}
