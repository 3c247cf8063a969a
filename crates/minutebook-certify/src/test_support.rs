// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for unit tests.

use chrono::{TimeZone, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use minutebook_core::types::{CertificationMetadata, Lane};

pub fn metadata() -> CertificationMetadata {
    CertificationMetadata::new(
        "Northwind Trading Inc.",
        Lane::Production,
        "Minutes of the Board",
        "secretary@northwind",
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
    )
}

/// A plain `pages`-page PDF with a distinct line of text on each page.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    sample_pdf_with_title(pages, "Resolution")
}

pub fn sample_pdf_with_title(pages: usize, title: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });

    let mut kids = Vec::new();
    for index in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{title} {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
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
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Scan the QR image on the last page of a certified document.
pub fn decode_embedded_qr(pdf: &[u8]) -> String {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = *doc.get_pages().values().last().unwrap();
    let page = doc.get_dictionary(page_id).unwrap();
    let resources_id = page.get(b"Resources").unwrap().as_reference().unwrap();
    let resources = doc.get_dictionary(resources_id).unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let qr_id = xobjects.get(b"QR").unwrap().as_reference().unwrap();
    let stream = doc.get_object(qr_id).unwrap().as_stream().unwrap();

    let width = stream.dict.get(b"Width").unwrap().as_i64().unwrap() as usize;
    let height = stream.dict.get(b"Height").unwrap().as_i64().unwrap() as usize;
    let row_bytes = width.div_ceil(8);
    let samples = &stream.content;

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        let byte = samples[y * row_bytes + x / 8];
        if byte & (0x80 >> (x % 8)) != 0 { 255 } else { 0 }
    });
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected one QR symbol on the certification page");
    let (_meta, content) = grids[0].decode().unwrap();
    content
}
