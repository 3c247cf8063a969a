// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the fixed-point resolver.
//
// `resolve_worst_case` uses a composer with no fixed point so every run pays
// the full fast + polish + alignment budget; `resolve_document` drives the
// real composer on a one-page source.

use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use minutebook_certify::{Compose, FixedPointResolver};
use minutebook_core::error::MinutebookError;
use minutebook_core::types::{CertificationMetadata, Lane, build_verify_url};
use minutebook_document::{DocumentComposer, QrOptions};

const BASE: &str = "https://records.example.org/verify.html";

/// Echoes the URL into a 64 KiB body, so no fixed point exists.
struct Echo;

impl Compose for Echo {
    fn compose(&self, url: &str) -> Result<Vec<u8>, MinutebookError> {
        let mut body = vec![0u8; 64 * 1024];
        body[..url.len()].copy_from_slice(url.as_bytes());
        Ok(body)
    }
}

fn one_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("Resolved, that")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture serialises");
    bytes
}

fn bench_resolve_worst_case(c: &mut Criterion) {
    let resolver = FixedPointResolver::default();
    c.bench_function("resolve_worst_case (64 KiB echo)", |b| {
        b.iter(|| {
            black_box(
                resolver
                    .resolve(&Echo, |d| build_verify_url(BASE, d))
                    .expect("resolves"),
            )
        });
    });
}

fn bench_resolve_document(c: &mut Criterion) {
    let metadata = CertificationMetadata::new(
        "Northwind Trading Inc.",
        Lane::Production,
        "Minutes of the Board",
        "bench",
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    );
    let composer = DocumentComposer::from_bytes(&one_page_pdf(), metadata, QrOptions::default())
        .expect("fixture parses");
    let resolver = FixedPointResolver::new(4, 2);

    let mut group = c.benchmark_group("resolve_document");
    group.sample_size(10);
    group.bench_function("1 page, 4+2 budget", |b| {
        b.iter(|| {
            black_box(
                resolver
                    .resolve(&composer, |d| build_verify_url(BASE, d))
                    .expect("resolves"),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_resolve_worst_case, bench_resolve_document);
criterion_main!(benches);
