// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fake scan: rasterise each page and degrade it the way a flatbed scanner
// would (grayscale, slight skew, sensor noise, contrast and brightness
// drift), then lay the JPEGs out as a new image-only PDF.

use blattwerk_core::config::ScanConfig;
use blattwerk_core::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;
use crate::pdf::PdfDocument;
use crate::pdf::writer::{JpegPage, jpeg_pages_to_pdf};
use crate::render::Rasterizer;

/// Parameters of a fake scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeScanOptions {
    #[serde(flatten)]
    pub config: ScanConfig,
    /// Fixed seed for reproducible output; `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl FakeScanOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            config: ScanConfig::default(),
            seed: Some(seed),
        }
    }
}

/// Per-page distortion drawn from the configured ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Distortion {
    angle: f32,
    noise_seed: u64,
    contrast: f32,
    brightness: f32,
}

fn uniform(rng: &mut StdRng, (a, b): (f32, f32)) -> f32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    rng.gen_range(lo..=hi)
}

impl Distortion {
    fn sample(rng: &mut StdRng, config: &ScanConfig) -> Self {
        let max = config.max_rotation_degrees.abs();
        Self {
            angle: uniform(rng, (-max, max)),
            noise_seed: rng.r#gen(),
            contrast: uniform(rng, config.contrast_range),
            brightness: uniform(rng, config.brightness_range),
        }
    }
}

/// Produce a scanned-looking copy of `doc`: one grayscale JPEG page per
/// input page.
#[instrument(skip_all, fields(pages = doc.page_count(), seed = ?options.seed))]
pub fn fake_scan(
    doc: &PdfDocument,
    options: &FakeScanOptions,
    rasterizer: &dyn Rasterizer,
) -> Result<PdfDocument> {
    let config = &options.config;
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut pages = Vec::with_capacity(doc.page_count() as usize);
    for page in 1..=doc.page_count() {
        let bitmap = rasterizer.render_page(doc, page, config.zoom)?;
        let d = Distortion::sample(&mut rng, config);

        let processed = ImageProcessor::from_dynamic(bitmap)
            .grayscale()
            .rotate(d.angle)
            .add_noise(config.noise_stddev, d.noise_seed)
            .adjust_contrast(d.contrast)
            .adjust_brightness(d.brightness);

        debug!(
            page,
            angle = d.angle,
            contrast = d.contrast,
            brightness = d.brightness,
            "Page scanned"
        );
        pages.push(JpegPage {
            width: processed.width(),
            height: processed.height(),
            grayscale: processed.is_grayscale(),
            data: processed.to_jpeg_bytes(config.jpeg_quality)?,
        });
    }

    let scanned = jpeg_pages_to_pdf(&pages, config.dpi)?;
    info!(pages = scanned.page_count(), "Fake scan complete");
    Ok(scanned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::tests::text_pdf;
    use crate::render::GreekingRasterizer;

    fn small() -> FakeScanOptions {
        let mut options = FakeScanOptions::seeded(7);
        options.config.zoom = 0.5;
        options
    }

    #[test]
    fn one_grayscale_jpeg_page_per_input_page() {
        let doc = text_pdf(&[&["alpha"], &["beta"]]);
        let mut scanned = fake_scan(&doc, &small(), &GreekingRasterizer).unwrap();
        assert_eq!(scanned.page_count(), 2);

        // 612 pt at zoom 0.5 is 306 px, laid out at 150 dpi.
        let size = scanned.page_size(1).unwrap();
        assert!((size.width - 306.0 / 150.0 * 72.0).abs() < 0.01);

        let images: Vec<_> = scanned
            .inner()
            .objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(|o| o.as_name()).ok() == Some(b"Image".as_slice()))
            .collect();
        assert_eq!(images.len(), 2);
        for stream in images {
            assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
            let decoded = ImageProcessor::from_bytes(&stream.content).unwrap();
            assert!(decoded.is_grayscale());
        }

        let bytes = scanned.to_bytes().unwrap();
        assert_eq!(PdfDocument::from_bytes(&bytes).unwrap().page_count(), 2);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let doc = text_pdf(&[&["same seed"]]);
        let jpeg = |options: &FakeScanOptions| {
            let scanned = fake_scan(&doc, options, &GreekingRasterizer).unwrap();
            scanned
                .inner()
                .objects
                .values()
                .filter_map(|obj| obj.as_stream().ok())
                .find(|s| s.dict.get(b"Filter").and_then(|o| o.as_name()).ok() == Some(b"DCTDecode".as_slice()))
                .map(|s| s.content.clone())
                .unwrap()
        };
        assert_eq!(jpeg(&small()), jpeg(&small()));

        let mut other = small();
        other.seed = Some(8);
        assert_ne!(jpeg(&small()), jpeg(&other));
    }

    #[test]
    fn options_deserialize_flat() {
        let options: FakeScanOptions =
            serde_json::from_str(r#"{"zoom": 1.0, "seed": 3}"#).unwrap();
        assert_eq!(options.seed, Some(3));
        assert_eq!(options.config.zoom, 1.0);
        assert_eq!(options.config.jpeg_quality, 60);
    }
}
