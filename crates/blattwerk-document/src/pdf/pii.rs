// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named patterns for personally identifiable information, and pattern-driven
// redaction.

use std::collections::BTreeMap;

use blattwerk_core::error::{BlattwerkError, Result};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::document::PdfDocument;

const EMAIL: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const CREDIT_CARD: &str = r"\b(?:\d[ -]*?){13,16}\b";
const PHONE: &str = r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}";

/// Registry of named PII patterns.
#[derive(Debug, Clone)]
pub struct PiiPatterns {
    patterns: BTreeMap<String, Regex>,
}

impl Default for PiiPatterns {
    fn default() -> Self {
        let mut patterns = BTreeMap::new();
        for (name, source) in [("email", EMAIL), ("credit_card", CREDIT_CARD), ("phone", PHONE)] {
            match compile(source) {
                Ok(regex) => {
                    patterns.insert(name.to_string(), regex);
                }
                Err(err) => warn!(name, %err, "Built-in PII pattern unavailable"),
            }
        }
        Self { patterns }
    }
}

impl PiiPatterns {
    /// Add or override a named pattern.
    pub fn register(&mut self, name: impl Into<String>, pattern: &str) -> Result<()> {
        self.patterns.insert(name.into(), compile(pattern)?);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    /// Resolve a pattern name. Unknown names are compiled as a regular
    /// expression, or matched literally when they are not a valid one.
    pub fn resolve(&self, name: &str) -> Result<Regex> {
        if let Some(regex) = self.patterns.get(name) {
            return Ok(regex.clone());
        }
        match Regex::new(name) {
            Ok(regex) => Ok(regex),
            Err(err) => {
                debug!(name, %err, "Not a pattern, matching literally");
                compile(&regex::escape(name))
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| BlattwerkError::Parse(format!("invalid pattern {pattern:?}: {err}")))
}

impl PdfDocument {
    /// Redact every match of each named pattern. Returns the number of
    /// matches removed.
    #[instrument(skip(self, patterns))]
    pub fn smart_redact(&mut self, names: &[String], patterns: &PiiPatterns) -> Result<usize> {
        if names.is_empty() {
            warn!("No PII patterns requested");
        }
        let mut total = 0;
        for name in names {
            let regex = patterns.resolve(name)?;
            let count = self.redact_regex(&regex)?;
            debug!(name = name.as_str(), count, "PII pattern applied");
            total += count;
        }
        info!(matches = total, "PII redacted");
        Ok(total)
    }
}
