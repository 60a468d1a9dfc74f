// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Blattwerk.

use thiserror::Error;

/// Top-level error type for all Blattwerk operations.
#[derive(Debug, Error)]
pub enum BlattwerkError {
    // -- Parameter errors --
    #[error("invalid parameter: {0}")]
    Parse(String),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    // -- Document engine errors --
    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    // -- External tools --
    #[error("required tool `{tool}` is not installed: {hint}")]
    ExternalToolMissing { tool: String, hint: String },

    #[error("external tool failed: {0}")]
    ExternalTool(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BlattwerkError {
    /// Whether the error comes from the document engine (corrupt input,
    /// unsupported encoding, wrong password) rather than from the caller's
    /// parameters or the environment.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDocument(_)
                | Self::PdfError(_)
                | Self::ImageError(_)
                | Self::Encryption(_)
                | Self::Decryption(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlattwerkError>;
