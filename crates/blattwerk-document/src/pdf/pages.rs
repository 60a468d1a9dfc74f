// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page selection and arrangement: reorder, extract, split, crop, and booklet
// imposition.

use std::collections::BTreeSet;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::types::{PageSize, Rect};
use tracing::{debug, info, instrument};

use super::document::{PdfDocument, clone_page_into};

fn parse_number(token: &str, input: &str) -> Result<u32> {
    token
        .parse::<u32>()
        .map_err(|_| BlattwerkError::Parse(format!("{token:?} is not a page number in {input:?}")))
}

/// Parse a comma-separated page order such as `"3, 1,2"`. Blank entries are
/// ignored.
pub fn parse_page_order(input: &str) -> Result<Vec<u32>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse_number(token, input))
        .collect()
}

/// Parse a page set such as `"1-3,5"`: single pages and inclusive ranges,
/// whitespace ignored. Pages outside `1..=last_page` are dropped and a
/// reversed range selects nothing.
pub fn parse_page_set(input: &str, last_page: u32) -> Result<BTreeSet<u32>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pages = BTreeSet::new();
    for token in compact.split(',') {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_number(start, input)?;
                let end = parse_number(end, input)?;
                pages.extend(start.max(1)..=end.min(last_page));
            }
            None => {
                let page = parse_number(token, input)?;
                if (1..=last_page).contains(&page) {
                    pages.insert(page);
                }
            }
        }
    }
    Ok(pages)
}

/// Imposition order for a saddle-stitched booklet of `pages` pages: 0-based
/// indices into the document padded to a multiple of four. Each group of
/// four is one sheet: front left, front right, back left, back right.
pub fn booklet_order(pages: usize) -> Vec<usize> {
    let padded = pages.div_ceil(4) * 4;
    (0..padded / 4)
        .flat_map(|k| {
            [
                padded - 2 * k - 1,
                2 * k,
                2 * k + 1,
                padded - 2 * k - 2,
            ]
        })
        .collect()
}

impl PdfDocument {
    /// A copy with the given 1-based pages in the given order. Duplicates and
    /// omissions are allowed; out-of-range entries are dropped.
    #[instrument(skip(self))]
    pub fn reorder(&self, order: &[u32]) -> Result<PdfDocument> {
        let reordered = self.subset(order)?;
        info!(pages = reordered.page_count(), "Pages reordered");
        Ok(reordered)
    }

    /// A copy holding the pages named by a page-set expression, ascending and
    /// without duplicates.
    #[instrument(skip(self))]
    pub fn extract_pages(&self, spec: &str) -> Result<PdfDocument> {
        let pages: Vec<u32> = parse_page_set(spec, self.page_count())?.into_iter().collect();
        debug!(?pages, "Extracting pages");
        self.subset(&pages)
    }

    /// One single-page document per page.
    pub fn split(&self) -> Result<Vec<PdfDocument>> {
        (1..=self.page_count()).map(|page| self.subset(&[page])).collect()
    }

    /// Set every page's crop box to `left, top, right, bottom` in top-left
    /// coordinates. A missing right or bottom edge defaults to that page's
    /// width or height.
    #[instrument(skip(self))]
    pub fn crop(&mut self, left: f32, top: f32, right: Option<f32>, bottom: Option<f32>) -> Result<()> {
        for page in 1..=self.page_count() {
            let size = self.page_size(page)?;
            let rect = Rect::new(
                left,
                top,
                right.unwrap_or(size.width),
                bottom.unwrap_or(size.height),
            );
            self.set_cropbox(page, rect)?;
        }
        Ok(())
    }

    /// Arrange the pages for booklet printing. Blank pages the size of the
    /// first page pad the document to a multiple of four.
    #[instrument(skip(self))]
    pub fn booklet(&self) -> Result<PdfDocument> {
        let source = self.page_ids();
        let blank_size = match source.first() {
            Some(first) => self.geometry(*first).size(),
            None => PageSize::LETTER,
        };

        let mut target = PdfDocument::new();
        for index in booklet_order(source.len()) {
            match source.get(index) {
                Some(page_id) => {
                    clone_page_into(self.inner(), target.inner_mut(), *page_id)?;
                }
                None => {
                    target.append_blank_page(blank_size)?;
                }
            }
        }
        info!(
            pages = source.len(),
            sheets = target.page_count() / 4,
            "Booklet imposed"
        );
        Ok(target)
    }
}
