// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: the raster adjustments used to make a rendered page look
// scanned (grayscale, slight rotation, sensor noise, contrast and brightness
// drift) plus JPEG output. Operates on in-memory images using the `image`
// and `imageproc` crates.

use blattwerk_core::error::{BlattwerkError, Result};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns the transformed processor, so
/// adjustments chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_dynamic(page)
///     .grayscale()
///     .rotate(0.3)
///     .add_noise(2.0, 7)
///     .adjust_contrast(1.2)
///     .adjust_brightness(0.97)
///     .to_jpeg_bytes(60)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Decode raw bytes (JPEG, PNG, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| BlattwerkError::ImageError(format!("failed to decode image: {}", err)))?;
        debug!(width = image.width(), height = image.height(), "Image decoded");
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_grayscale(&self) -> bool {
        matches!(self.image, DynamicImage::ImageLuma8(_))
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Adjustments ----------------------------------------------------------

    /// Convert to 8-bit luma.
    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Rotate about the centre by `degrees` (counter-clockwise), keeping the
    /// canvas size and filling uncovered corners with white. The result is
    /// grayscale.
    #[instrument(skip(self))]
    pub fn rotate(self, degrees: f32) -> Self {
        if degrees.abs() < f32::EPSILON {
            return self.grayscale();
        }
        let gray = self.image.to_luma8();
        // imageproc rotates clockwise for positive angles in image space.
        let rotated = rotate_about_center(
            &gray,
            -degrees.to_radians(),
            Interpolation::Bilinear,
            Luma([255u8]),
        );
        Self {
            image: DynamicImage::ImageLuma8(rotated),
        }
    }

    /// Add zero-mean Gaussian noise with standard deviation `stddev`,
    /// clipped to the valid range. The same seed gives the same noise.
    pub fn add_noise(self, stddev: f64, seed: u64) -> Self {
        let gray = self.image.to_luma8();
        let noisy: GrayImage = imageproc::noise::gaussian_noise(&gray, 0.0, stddev, seed);
        Self {
            image: DynamicImage::ImageLuma8(noisy),
        }
    }

    /// Scale the distance of every pixel from the mean luminance by
    /// `factor`. 1.0 leaves the image unchanged.
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let mut gray = self.image.to_luma8();
        let pixels = (gray.width() as u64 * gray.height() as u64).max(1);
        let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
        let mean = (sum as f32 / pixels as f32).round();
        for pixel in gray.pixels_mut() {
            let value = mean + factor * (pixel.0[0] as f32 - mean);
            pixel.0[0] = value.round().clamp(0.0, 255.0) as u8;
        }
        Self {
            image: DynamicImage::ImageLuma8(gray),
        }
    }

    /// Multiply every pixel by `factor`. 1.0 leaves the image unchanged.
    pub fn adjust_brightness(self, factor: f32) -> Self {
        let mut gray = self.image.to_luma8();
        for pixel in gray.pixels_mut() {
            pixel.0[0] = (pixel.0[0] as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
        Self {
            image: DynamicImage::ImageLuma8(gray),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as JPEG with the given quality (1-100). Grayscale images stay
    /// single-channel; everything else is written as RGB.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        let encoded = match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.write_with_encoder(encoder),
            other => other.to_rgb8().write_with_encoder(encoder),
        };
        encoded.map_err(|err| BlattwerkError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient() -> ImageProcessor {
        let img = RgbImage::from_fn(40, 20, |x, _| image::Rgb([(x * 6) as u8; 3]));
        ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(img))
    }

    fn luma(p: &ImageProcessor, x: u32, y: u32) -> u8 {
        p.image.to_luma8().get_pixel(x, y).0[0]
    }

    #[test]
    fn grayscale_is_single_channel() {
        let gray = gradient().grayscale();
        assert!(gray.is_grayscale());
        assert_eq!((gray.width(), gray.height()), (40, 20));
    }

    #[test]
    fn rotation_keeps_size_and_fills_white() {
        let black = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(100, 100)));
        let rotated = black.rotate(10.0);
        assert_eq!((rotated.width(), rotated.height()), (100, 100));
        assert_eq!(luma(&rotated, 0, 0), 255);
        assert_eq!(luma(&rotated, 50, 50), 0);
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        let a = gradient().add_noise(8.0, 42).into_dynamic();
        let b = gradient().add_noise(8.0, 42).into_dynamic();
        let c = gradient().add_noise(8.0, 43).into_dynamic();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn contrast_pivots_on_the_mean() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 200 }]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(img)).adjust_contrast(2.0);
        assert_eq!(luma(&out, 0, 0), 50);
        assert_eq!(luma(&out, 1, 0), 250);
    }

    #[test]
    fn brightness_is_multiplicative() {
        let img = GrayImage::from_pixel(1, 1, Luma([200]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(img)).adjust_brightness(1.1);
        assert_eq!(luma(&out, 0, 0), 220);
        let dark = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([0]))))
            .adjust_brightness(1.05);
        assert_eq!(luma(&dark, 0, 0), 0);
    }

    #[test]
    fn grayscale_jpeg_round_trips() {
        let bytes = gradient().grayscale().to_jpeg_bytes(60).unwrap();
        let decoded = ImageProcessor::from_bytes(&bytes).unwrap();
        assert!(decoded.is_grayscale());
        assert_eq!(decoded.width(), 40);
    }
}
