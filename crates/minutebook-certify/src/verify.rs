// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact verification: hash a file someone hands us and look it up.

use minutebook_core::error::Result;
use minutebook_core::types::{ContentDigest, VerificationLevel};
use minutebook_security::digest;
use serde::Serialize;
use tracing::{info, instrument};

use crate::ports::{VerifiedRecord, VerifiedRegistry};

/// How a presented file relates to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum VerificationStatus {
    /// The file is the certified artifact, byte for byte.
    Authentic,
    /// The registry knows the file but its certification was revoked.
    Revoked,
    /// The digest only matches what a certification page's QR code carries,
    /// not a stored artifact.
    EmbeddedOnly,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub digest: ContentDigest,
    #[serde(flatten)]
    pub status: VerificationStatus,
    pub record: Option<VerifiedRecord>,
}

impl VerificationReport {
    pub fn is_authentic(&self) -> bool {
        self.status == VerificationStatus::Authentic
    }
}

/// Hash `bytes` and classify them against `registry`.
#[instrument(skip_all, fields(len = bytes.len()))]
pub async fn verify_artifact<R>(bytes: &[u8], registry: &R) -> Result<VerificationReport>
where
    R: VerifiedRegistry + ?Sized,
{
    let digest = digest(bytes);
    let record = registry.find_by_digest(&digest.to_hex()).await?;
    let status = match &record {
        None => VerificationStatus::Unknown,
        Some(r) if r.digest != digest => VerificationStatus::EmbeddedOnly,
        Some(r) if r.level == VerificationLevel::Revoked => VerificationStatus::Revoked,
        Some(_) => VerificationStatus::Authentic,
    };
    info!(digest = %digest.short_hex(12), ?status, "artifact verified");
    Ok(VerificationReport {
        digest,
        status,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use minutebook_core::types::{Lane, VerifiedDocumentId};

    use crate::memory::MemoryRegistry;

    fn record_for(bytes: &[u8], level: VerificationLevel) -> VerifiedRecord {
        VerifiedRecord {
            id: VerifiedDocumentId::new(),
            entry_id: "e1".into(),
            namespace: "governance_certified".into(),
            path: "minute-book/e1.pdf".into(),
            digest: digest(bytes),
            embedded_digest: digest(b"an earlier candidate"),
            verify_url: String::new(),
            byte_size: bytes.len() as u64,
            level,
            lane: Lane::Production,
            certified_by: "system".into(),
            certified_at: Utc::now(),
            converged: false,
            forced_alignment: true,
        }
    }

    #[tokio::test]
    async fn exact_artifact_is_authentic() {
        let registry = MemoryRegistry::new();
        registry.upsert(record_for(b"artifact", VerificationLevel::Certified), None).await.unwrap();

        let report = verify_artifact(b"artifact", &registry).await.unwrap();
        assert!(report.is_authentic());
        assert_eq!(report.record.unwrap().entry_id, "e1");
    }

    #[tokio::test]
    async fn revoked_and_unknown_files() {
        let registry = MemoryRegistry::new();
        registry.upsert(record_for(b"artifact", VerificationLevel::Revoked), None).await.unwrap();

        let revoked = verify_artifact(b"artifact", &registry).await.unwrap();
        assert_eq!(revoked.status, VerificationStatus::Revoked);

        let unknown = verify_artifact(b"something else", &registry).await.unwrap();
        assert_eq!(unknown.status, VerificationStatus::Unknown);
        assert!(unknown.record.is_none());
    }

    #[tokio::test]
    async fn embedded_digest_match_is_flagged() {
        let registry = MemoryRegistry::new();
        registry.upsert(record_for(b"artifact", VerificationLevel::Certified), None).await.unwrap();

        let report = verify_artifact(b"an earlier candidate", &registry).await.unwrap();
        assert_eq!(report.status, VerificationStatus::EmbeddedOnly);
        assert!(!report.is_authentic());
    }
}
