// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the minutebook-document crate: QR rasterization
// and a full certified-document composition, the unit of work the fixed-point
// resolver repeats.

use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use minutebook_core::types::{CertificationMetadata, ContentDigest, Lane, build_verify_url};
use minutebook_document::{DocumentComposer, QrOptions, rasterize};

const BASE: &str = "https://records.example.org/verify.html";

/// A small text-only source document with `pages` pages.
fn source_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(pages);
    for n in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 770.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Resolution {}", n + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().expect("content encodes");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture serialises");
    bytes
}

/// Benchmark rasterizing a full-length verification URL.
fn bench_rasterize(c: &mut Criterion) {
    let url = build_verify_url(BASE, &ContentDigest::from_bytes([0x42; 32]));
    let opts = QrOptions::default();

    c.bench_function("rasterize (verify url)", |b| {
        b.iter(|| black_box(rasterize(black_box(&url), &opts).expect("encodes")));
    });
}

/// Benchmark one composition of a 10-page source.
///
/// The source is parsed once outside the loop, matching how the resolver
/// reuses a single composer across iterations.
fn bench_compose(c: &mut Criterion) {
    let metadata = CertificationMetadata::new(
        "Northwind Trading Inc.",
        Lane::Production,
        "Minutes of the Board",
        "bench",
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    );
    let composer = DocumentComposer::from_bytes(&source_pdf(10), metadata, QrOptions::default())
        .expect("fixture parses");
    let url = build_verify_url(BASE, &ContentDigest::from_bytes([0x17; 32]));

    c.bench_function("compose (10 pages)", |b| {
        b.iter(|| black_box(composer.compose(black_box(&url)).expect("composes")));
    });
}

criterion_group!(benches, bench_rasterize, bench_compose);
criterion_main!(benches);
