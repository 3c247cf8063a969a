// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document composer — source pages plus one certification page, serialised
// deterministically.

use lopdf::{Document, Object, dictionary};
use minutebook_core::error::MinutebookError;
use minutebook_core::types::CertificationMetadata;
use tracing::{debug, instrument};

use super::copy::PageCopier;
use super::deterministic::{OUTPUT_VERSION, serialize_deterministically};
use super::page::CertificationPage;
use super::source::SourceDocument;
use crate::qr::{QrOptions, rasterize};

/// Composes certified documents for one source and one set of metadata.
///
/// The source is parsed once; [`DocumentComposer::compose`] may then be
/// called any number of times with different verification URLs, which is
/// exactly what the fixed-point loop does.
#[derive(Debug, Clone)]
pub struct DocumentComposer {
    source: SourceDocument,
    metadata: CertificationMetadata,
    qr: QrOptions,
}

impl DocumentComposer {
    pub fn new(source: SourceDocument, metadata: CertificationMetadata, qr: QrOptions) -> Self {
        Self {
            source,
            metadata,
            qr,
        }
    }

    /// Parse `source_bytes` and build a composer around them.
    pub fn from_bytes(
        source_bytes: &[u8],
        metadata: CertificationMetadata,
        qr: QrOptions,
    ) -> Result<Self, MinutebookError> {
        Ok(Self::new(SourceDocument::from_bytes(source_bytes)?, metadata, qr))
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn metadata(&self) -> &CertificationMetadata {
        &self.metadata
    }

    /// Build the certified document whose QR code encodes `verification_url`.
    ///
    /// Pure: identical inputs give byte-identical output.
    #[instrument(skip_all, fields(url_len = verification_url.len()))]
    pub fn compose(&self, verification_url: &str) -> Result<Vec<u8>, MinutebookError> {
        let bitmap = rasterize(verification_url, &self.qr)?;

        let mut output = Document::with_version(OUTPUT_VERSION);
        let pages_id = output.new_object_id();

        let mut copier = PageCopier::new(self.source.document());
        let mut kids: Vec<Object> = Vec::with_capacity(self.source.page_count() + 1);
        for page_id in self.source.page_ids() {
            let copied = copier.copy_page(&mut output, page_id, pages_id)?;
            kids.push(copied.into());
        }

        let certification_id =
            CertificationPage::new(&self.metadata, &bitmap).add_to(&mut output, pages_id)?;
        kids.push(certification_id.into());

        let count = kids.len() as i64;
        output.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = output.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        output.trailer.set("Root", catalog_id);

        debug!(
            pages = count,
            copied_objects = copier.copied_objects(),
            "certified document assembled"
        );
        serialize_deterministically(&mut output)
    }
}

/// One-shot composition: parse, append the certification page, serialise.
pub fn compose(
    source_bytes: &[u8],
    verification_url: &str,
    metadata: &CertificationMetadata,
) -> Result<Vec<u8>, MinutebookError> {
    DocumentComposer::from_bytes(source_bytes, metadata.clone(), QrOptions::default())?
        .compose(verification_url)
}
