// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the blattwerk-document crate: booklet page
// ordering and text search over a laid-out page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};

use blattwerk_document::PdfDocument;
use blattwerk_document::pdf::booklet_order;

/// A one-page document with `lines` lines of Helvetica body text.
fn text_document(lines: usize) -> PdfDocument {
    let mut doc = PdfDocument::new();
    let page_id = doc.append_blank_page(blattwerk_core::PageSize::LETTER).unwrap();

    let inner = doc.inner_mut();
    let font_id = inner.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("TL", vec![12.into()]),
        Operation::new("Td", vec![36.into(), 760.into()]),
    ];
    for i in 0..lines {
        let line = format!("Line {i}: the quick brown fox jumps over the lazy dog");
        operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    let content = Content { operations }.encode().unwrap();
    let contents_id = inner.add_object(Stream::new(dictionary! {}, content));

    let page = inner.get_dictionary_mut(page_id).unwrap();
    page.set("Contents", contents_id);
    page.set(
        "Resources",
        dictionary! { "Font" => dictionary! { "F1" => font_id } },
    );
    doc
}

fn bench_booklet_order(c: &mut Criterion) {
    c.bench_function("booklet_order (1000 pages)", |b| {
        b.iter(|| black_box(booklet_order(black_box(1000))));
    });
}

fn bench_search(c: &mut Criterion) {
    let doc = text_document(60);
    c.bench_function("search_for (60 lines)", |b| {
        b.iter(|| black_box(doc.search_for(1, black_box("lazy dog")).unwrap()));
    });
}

criterion_group!(benches, bench_booklet_order, bench_search);
criterion_main!(benches);
