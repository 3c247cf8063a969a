// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic serialisation.
//
// The fixed-point resolver compares digests of successive compositions, so
// the same logical document must always serialise to the same bytes. Every
// knob that could vary between saves is pinned here and nowhere else:
//
//   * /Info CreationDate and ModDate are a constant sentinel, never "now";
//   * /Producer is constant;
//   * the trailer /ID pair is a constant, never randomly generated;
//   * cross-references are written as a classic table and no object streams
//     are produced, so no compressor output ends up in the file structure.

use lopdf::xref::XrefType;
use lopdf::{Document, Object, StringFormat, dictionary};
use minutebook_core::error::MinutebookError;
use tracing::{debug, instrument};

/// Creation/modification date written into every certified document.
pub const SENTINEL_DATE: &str = "D:20000101000000Z";

/// Producer string written into every certified document.
pub const PRODUCER: &str = "minutebook certification";

/// Both halves of the trailer file identifier.
pub const FILE_ID: [u8; 16] = *b"minutebook-cert1";

/// PDF header version of certified output.
pub const OUTPUT_VERSION: &str = "1.7";

/// Serialise `document` with the fixed configuration above.
///
/// Any existing /Info dictionary is replaced; object streams and
/// cross-reference streams present in the object table are dropped.
#[instrument(skip_all, fields(objects = document.objects.len()))]
pub fn serialize_deterministically(document: &mut Document) -> Result<Vec<u8>, MinutebookError> {
    document.version = OUTPUT_VERSION.to_string();
    document.reference_table.cross_reference_type = XrefType::CrossReferenceTable;

    let packed: Vec<_> = document
        .objects
        .iter()
        .filter(|(_, object)| is_structural_stream(object))
        .map(|(id, _)| *id)
        .collect();
    for id in packed {
        document.objects.remove(&id);
    }

    let info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
        "CreationDate" => Object::string_literal(SENTINEL_DATE),
        "ModDate" => Object::string_literal(SENTINEL_DATE),
    };
    match document.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(info_id) => {
            document.objects.insert(info_id, Object::Dictionary(info));
        }
        Err(_) => {
            let info_id = document.add_object(info);
            document.trailer.set("Info", info_id);
        }
    }

    let file_id = Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal);
    document
        .trailer
        .set("ID", Object::Array(vec![file_id.clone(), file_id]));

    let mut output = Vec::new();
    document.save_to(&mut output).map_err(|err| {
        MinutebookError::PdfError(format!("failed to serialise PDF: {}", err))
    })?;

    debug!(output_bytes = output.len(), "document serialised");
    Ok(output)
}

/// Object streams and cross-reference streams carry file structure rather
/// than content; they are regenerated (or, here, never generated) on save.
fn is_structural_stream(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"ObjStm" || name == b"XRef"
        ),
        _ => false,
    }
}
