// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for command-line and service callers.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity decides whether a caller should retry, fix its input, or give up.

use crate::error::BlattwerkError;

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Temporary condition; retrying the same call may succeed.
    Transient,
    /// The caller must change something (parameters, password, installed tools).
    ActionRequired,
    /// Retrying will not help; the input itself is unusable.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the caller should try.
    pub suggestion: String,
    /// Whether retrying unchanged can succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `BlattwerkError` into a `HumanError`.
pub fn humanize_error(err: &BlattwerkError) -> HumanError {
    match err {
        // -- Parameter errors --
        BlattwerkError::Parse(detail) => HumanError {
            message: "A parameter couldn't be understood.".into(),
            suggestion: format!("Check the value and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BlattwerkError::PageOutOfRange { page, page_count } => HumanError {
            message: format!("Page {page} doesn't exist."),
            suggestion: format!("This document has {page_count} pages. Page numbers start at 1."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Document engine errors --
        BlattwerkError::UnsupportedDocument(detail) => HumanError {
            message: "This type of document isn't supported.".into(),
            suggestion: format!("Try saving the file as a PDF first. (Detail: {detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        BlattwerkError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it in a PDF viewer to check it works, or try a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BlattwerkError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BlattwerkError::Encryption(_) => HumanError {
            message: "The document couldn't be protected.".into(),
            suggestion: "The file may already be encrypted. Remove the existing password first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BlattwerkError::Decryption(_) => HumanError {
            message: "The document couldn't be unlocked.".into(),
            suggestion: "Check the password and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- External tools --
        BlattwerkError::ExternalToolMissing { tool, hint } => HumanError {
            message: format!("`{tool}` isn't installed."),
            suggestion: hint.clone(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BlattwerkError::ExternalTool(detail) => HumanError {
            message: "An external converter failed.".into(),
            suggestion: format!("Try again. If this keeps happening, check the input file. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Plumbing --
        BlattwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission denied while accessing a file.".into(),
                    suggestion: "Check the file permissions, or write the output to a different location.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        BlattwerkError::Serialization(_) => HumanError {
            message: "A JSON value couldn't be read.".into(),
            suggestion: "Check the JSON syntax of the config file or annotation list.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_page_range_is_action_required() {
        let human = humanize_error(&BlattwerkError::Parse("x-3".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn out_of_range_mentions_page_count() {
        let human = humanize_error(&BlattwerkError::PageOutOfRange {
            page: 9,
            page_count: 3,
        });
        assert!(human.suggestion.contains('3'));
    }

    #[test]
    fn missing_tool_carries_install_hint() {
        let err = BlattwerkError::ExternalToolMissing {
            tool: "wkhtmltopdf".into(),
            hint: "install wkhtmltopdf from your package manager".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("package manager"));
    }

    #[test]
    fn wrong_password_asks_to_check_it() {
        let human = humanize_error(&BlattwerkError::Decryption("bad password".into()));
        assert!(human.suggestion.contains("password"));
    }

    #[test]
    fn corrupt_pdf_is_permanent() {
        let human = humanize_error(&BlattwerkError::PdfError("xref".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }

    #[test]
    fn missing_file_is_not_retriable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let human = humanize_error(&BlattwerkError::Io(io));
        assert!(!human.retriable);
    }
}
