// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source document — the evidentiary original, parsed once and only read.

use lopdf::{Document, ObjectId};
use minutebook_core::error::MinutebookError;
use tracing::{debug, instrument};

/// A parsed source PDF with at least one page.
///
/// Parsing happens once per certification request; every composition cycle
/// of the fixed-point loop copies pages out of the same parsed document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    document: Document,
    byte_len: usize,
}

impl SourceDocument {
    /// Parse PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, MinutebookError> {
        let document = Document::load_mem(data).map_err(|err| {
            MinutebookError::PdfError(format!("failed to load source PDF: {}", err))
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(MinutebookError::PdfError(
                "encrypted source PDFs cannot be certified".into(),
            ));
        }

        let pages = document.get_pages().len();
        if pages == 0 {
            return Err(MinutebookError::PdfError("source PDF has no pages".into()));
        }

        debug!(pages, "source PDF loaded");
        Ok(Self {
            document,
            byte_len: data.len(),
        })
    }

    /// Number of pages in the source.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page object ids in reading order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        // `get_pages` is keyed by 1-indexed page number, so values are ordered.
        self.document.get_pages().into_values().collect()
    }

    /// Size of the original byte buffer.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Borrow the parsed document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}
