// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator interfaces the orchestrator is constructed with.
//
// Source retrieval, artifact storage and the verified-document registry are
// owned by other systems; the pipeline only sees these traits. Filesystem,
// SQLite and in-memory implementations live alongside.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use minutebook_core::error::Result;
use minutebook_core::types::{ContentDigest, Lane, VerificationLevel, VerifiedDocumentId};
use serde::{Deserialize, Serialize};

/// Where the original evidentiary PDF for an entry lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePointer {
    pub entry_id: String,
    pub namespace: String,
    pub path: String,
    /// Digest recorded when the source was filed, if any.
    pub known_hash: Option<ContentDigest>,
    pub entity_label: String,
    pub document_class: String,
}

#[async_trait]
pub trait SourceRepository: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str {
        "unknown"
    }

    /// Resolve an entry to its source pointer. `Ok(None)` means no such entry.
    async fn locate(&self, entry_id: &str) -> Result<Option<SourcePointer>>;

    /// Download the source bytes.
    async fn fetch(&self, pointer: &SourcePointer) -> Result<Vec<u8>>;
}

/// Result of an artifact write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Something already exists at the path and `overwrite` was false.
    Conflict,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str {
        "unknown"
    }

    /// Store `bytes` at `namespace/path`. Without `overwrite` an existing
    /// object is left untouched and [`WriteOutcome::Conflict`] is returned.
    async fn write(
        &self,
        namespace: &str,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<WriteOutcome>;

    async fn exists(&self, namespace: &str, path: &str) -> Result<bool>;

    async fn read(&self, namespace: &str, path: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the object at `namespace/path`. `Ok(false)` if there was none.
    async fn delete(&self, namespace: &str, path: &str) -> Result<bool>;
}

/// One row of the verified-document registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRecord {
    pub id: VerifiedDocumentId,
    pub entry_id: String,
    pub namespace: String,
    pub path: String,
    /// SHA-256 of the stored artifact.
    pub digest: ContentDigest,
    /// Digest encoded in the artifact's QR code.
    pub embedded_digest: ContentDigest,
    pub verify_url: String,
    pub byte_size: u64,
    pub level: VerificationLevel,
    pub lane: Lane,
    pub certified_by: String,
    pub certified_at: DateTime<Utc>,
    pub converged: bool,
    pub forced_alignment: bool,
}

/// Result of a conditional registry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWrite {
    /// The record as stored.
    Stored(VerifiedRecord),
    /// Another writer changed the row first; carries the row as found.
    Superseded(Option<VerifiedRecord>),
}

impl RegistryWrite {
    pub fn stored(self) -> Option<VerifiedRecord> {
        match self {
            Self::Stored(record) => Some(record),
            Self::Superseded(_) => None,
        }
    }
}

#[async_trait]
pub trait VerifiedRegistry: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str {
        "unknown"
    }

    async fn find(&self, entry_id: &str) -> Result<Option<VerifiedRecord>>;

    /// Insert or replace the record for `record.entry_id`, provided the row
    /// still holds `expected`: `None` requires that no row exists yet,
    /// `Some(digest)` requires the current row to have that digest.
    ///
    /// One row per entry. An existing row keeps its `id`. The check and the
    /// write are atomic with respect to other writers.
    async fn upsert(
        &self,
        record: VerifiedRecord,
        expected: Option<ContentDigest>,
    ) -> Result<RegistryWrite>;

    /// Look a record up by the artifact digest or by the digest its QR code
    /// carries. `digest_hex` is matched case-insensitively.
    async fn find_by_digest(&self, digest_hex: &str) -> Result<Option<VerifiedRecord>>;
}
