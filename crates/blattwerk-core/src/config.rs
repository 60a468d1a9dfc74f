// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Settings shared by all operations. Every field has a default, so a
/// partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Explicit path to `wkhtmltopdf`; `None` searches `PATH`.
    pub wkhtmltopdf_path: Option<PathBuf>,
    /// LibreOffice binary used for office conversions.
    pub office_converter: PathBuf,
    /// Zoom factor used when rasterising pages to images.
    pub raster_zoom: f32,
    /// JPEG quality (1-100) for page images.
    pub raster_jpeg_quality: u8,
    /// Font size of replacement text inserted by replace/edit operations.
    pub replacement_font_size: f32,
    /// Font size of diagonal watermarks.
    pub watermark_font_size: f32,
    /// Fill opacity of diagonal watermarks.
    pub watermark_opacity: f32,
    /// Fake-scan pipeline parameters.
    pub scan: ScanConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wkhtmltopdf_path: None,
            office_converter: PathBuf::from("soffice"),
            raster_zoom: 2.0,
            raster_jpeg_quality: 90,
            replacement_font_size: 12.0,
            watermark_font_size: 40.0,
            watermark_opacity: 0.3,
            scan: ScanConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "config loaded");
        Ok(config)
    }

    /// Read a JSON config file, falling back to defaults when it is absent
    /// or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.as_ref().display(), %err, "using default config");
                Self::default()
            }
        }
    }

    /// Write the config as pretty-printed JSON.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

/// Parameters of the simulated-scan pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Rasterisation zoom.
    pub zoom: f32,
    /// Rotation is sampled uniformly from `[-max, +max]` degrees.
    pub max_rotation_degrees: f32,
    /// Standard deviation of the additive Gaussian pixel noise.
    pub noise_stddev: f64,
    /// Contrast factor range (inclusive).
    pub contrast_range: (f32, f32),
    /// Brightness factor range (inclusive).
    pub brightness_range: (f32, f32),
    /// Resolution the scanned pages are laid out at.
    pub dpi: f32,
    /// JPEG quality (1-100) of each scanned page.
    pub jpeg_quality: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            zoom: 2.0,
            max_rotation_degrees: 0.5,
            noise_stddev: 2.0,
            contrast_range: (1.1, 1.3),
            brightness_range: (0.95, 1.05),
            dpi: 150.0,
            jpeg_quality: 60,
        }
    }
}
