// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document comparison: a longest-common-subsequence diff over page lines,
// with added and changed lines highlighted on the newer document.

use blattwerk_core::error::Result;
use blattwerk_core::types::Rgb;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::document::PdfDocument;

/// Classification of a line in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Equal,
    Added,
    Removed,
    /// A removed line replaced in place by an added one.
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl DiffLine {
    fn new(tag: DiffTag, old: Option<&str>, new: Option<&str>) -> Self {
        Self {
            tag,
            old: old.map(str::to_owned),
            new: new.map(str::to_owned),
        }
    }
}

/// Line diff of `old` against `new`. Runs of removals directly followed by
/// additions pair up into `Changed` lines.
pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let (n, m) = (old.len(), new.len());
    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n.max(m));
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();
    let flush = |out: &mut Vec<DiffLine>, removed: &mut Vec<&str>, added: &mut Vec<&str>| {
        let paired = removed.len().min(added.len());
        for k in 0..paired {
            out.push(DiffLine::new(DiffTag::Changed, Some(removed[k]), Some(added[k])));
        }
        for line in &removed[paired..] {
            out.push(DiffLine::new(DiffTag::Removed, Some(*line), None));
        }
        for line in &added[paired..] {
            out.push(DiffLine::new(DiffTag::Added, None, Some(*line)));
        }
        removed.clear();
        added.clear();
    };

    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && old[i] == new[j] {
            flush(&mut out, &mut removed, &mut added);
            out.push(DiffLine::new(DiffTag::Equal, Some(old[i]), Some(new[j])));
            i += 1;
            j += 1;
        } else if j < m && (i == n || lcs[i][j + 1] >= lcs[i + 1][j]) {
            added.push(new[j]);
            j += 1;
        } else {
            removed.push(old[i]);
            i += 1;
        }
    }
    flush(&mut out, &mut removed, &mut added);
    out
}

impl PdfDocument {
    /// Highlight in green, on this document, every line added or changed
    /// relative to `baseline`. Pages are paired by index up to the shorter
    /// document. Returns the number of highlights added.
    #[instrument(skip_all)]
    pub fn highlight_differences(&mut self, baseline: &PdfDocument) -> Result<usize> {
        let pairs = self.page_count().min(baseline.page_count());
        let mut highlights = 0;

        for page in 1..=pairs {
            let old_layout = baseline.text_layout(page)?;
            let new_layout = self.text_layout(page)?;
            let diff = diff_lines(&old_layout.line_texts(), &new_layout.line_texts());

            for line in diff {
                if !matches!(line.tag, DiffTag::Added | DiffTag::Changed) {
                    continue;
                }
                let Some(text) = line.new.as_deref().map(str::trim) else {
                    continue;
                };
                if text.is_empty() {
                    continue;
                }
                for rect in new_layout.search(text) {
                    self.add_highlight_annot(page, rect, Rgb::GREEN)?;
                    highlights += 1;
                }
            }
            debug!(page, highlights, "Page compared");
        }

        info!(pages = pairs, highlights, "Comparison complete");
        Ok(highlights)
    }
}
