// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certification orchestrator.
//
// locate -> reuse check -> download -> compute -> upload -> persist -> audit
//
// Every step depends on the previous one, so they are awaited in order. The
// compute step is CPU-bound and runs on the blocking pool under a deadline.
// Races between two requests for the same entry are settled twice over: the
// store's create-new write rejects a second artifact at the same path, and
// the registry write only lands if the row is still the one read at the
// start. The loser gets a conflict and its artifact is removed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use minutebook_core::config::CertifyConfig;
use minutebook_core::error::{MinutebookError, Result};
use minutebook_core::types::{
    CertificationMetadata, ContentDigest, Lane, VerificationLevel, VerifiedDocumentId,
    build_verify_url, check_verify_base_url,
};
use minutebook_document::{DocumentComposer, QrOptions};
use minutebook_security::{AuditEvent, AuditSender, verify_hash};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::ports::{
    ArtifactStore, RegistryWrite, SourceRepository, VerifiedRecord, VerifiedRegistry, WriteOutcome,
};
use crate::resolver::{CertificationResult, FixedPointResolver};
use crate::retry::{RetryConfig, with_retry};

/// Longest accepted entry identifier.
pub const MAX_ENTRY_ID_LEN: usize = 128;

/// A request to certify one minute-book entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationRequest {
    pub entry_id: String,
    /// Operator label printed on the page; the configured default otherwise.
    pub actor_id: Option<String>,
    pub lane: Option<Lane>,
    /// Re-certify even when a certified artifact exists, overwriting it.
    pub force_reissue: bool,
    pub verify_base_url: Option<String>,
    /// Pin the certification time instead of using the wall clock.
    pub certified_at: Option<DateTime<Utc>>,
}

impl CertificationRequest {
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            ..Default::default()
        }
    }
}

/// Where a certified artifact was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifiedArtifact {
    pub bucket: String,
    pub path: String,
    pub hash: ContentDigest,
    pub byte_size: u64,
}

/// Outcome of one certification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificationOutcome {
    Success {
        reused: bool,
        verified_document_id: VerifiedDocumentId,
        verify_url: String,
        certified: CertifiedArtifact,
        converged: bool,
        forced_alignment: bool,
    },
    /// An artifact already exists at the destination and reissue was not requested.
    Conflict { bucket: String, path: String },
    NotFound { entry_id: String },
    Failure { code: String, details: String },
}

impl CertificationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// External error code, `None` on success.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Conflict { .. } => Some("ALREADY_EXISTS_CONFLICT"),
            Self::NotFound { .. } => Some("SOURCE_NOT_FOUND"),
            Self::Failure { code, .. } => Some(code),
        }
    }

    /// Response body in the caller-facing JSON shape.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success {
                reused,
                verified_document_id,
                verify_url,
                certified,
                converged,
                forced_alignment,
            } => json!({
                "ok": true,
                "reused": reused,
                "verifiedDocumentId": verified_document_id.to_string(),
                "verifyUrl": verify_url,
                "certified": certified,
                "converged": converged,
                "forcedAlignment": forced_alignment,
            }),
            Self::Conflict { bucket, path } => json!({
                "ok": false,
                "errorCode": "ALREADY_EXISTS_CONFLICT",
                "details": { "bucket": bucket, "path": path },
            }),
            Self::NotFound { entry_id } => json!({
                "ok": false,
                "errorCode": "SOURCE_NOT_FOUND",
                "details": { "entryId": entry_id },
            }),
            Self::Failure { code, details } => json!({
                "ok": false,
                "errorCode": code,
                "details": details,
            }),
        }
    }
}

impl From<MinutebookError> for CertificationOutcome {
    fn from(err: MinutebookError) -> Self {
        Self::Failure {
            code: err.code().to_string(),
            details: err.to_string(),
        }
    }
}

/// Reject identifiers that are empty, too long, or not `[A-Za-z0-9_-]`.
pub fn validate_entry_id(entry_id: &str) -> Result<()> {
    if entry_id.is_empty() {
        return Err(MinutebookError::InvalidRequest("entry_id is required".into()));
    }
    if entry_id.len() > MAX_ENTRY_ID_LEN {
        return Err(MinutebookError::InvalidRequest(format!(
            "entry_id longer than {MAX_ENTRY_ID_LEN} characters"
        )));
    }
    if let Some(bad) = entry_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(MinutebookError::InvalidRequest(format!(
            "entry_id contains {bad:?}; only letters, digits, '-' and '_' are allowed"
        )));
    }
    Ok(())
}

/// Destination path of a certified artifact.
pub fn artifact_path(lane: Lane, entry_id: &str, digest: &ContentDigest) -> String {
    format!("{}/{}-{}.pdf", lane.storage_prefix(), entry_id, digest.short_hex(12))
}

/// Runs certification requests against injected collaborators.
pub struct Orchestrator {
    sources: Arc<dyn SourceRepository>,
    store: Arc<dyn ArtifactStore>,
    registry: Arc<dyn VerifiedRegistry>,
    config: CertifyConfig,
    retry: RetryConfig,
    audit: Option<AuditSender>,
}

impl Orchestrator {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        store: Arc<dyn ArtifactStore>,
        registry: Arc<dyn VerifiedRegistry>,
        config: CertifyConfig,
    ) -> Self {
        let retry = config.retry.into();
        debug!(
            sources = sources.backend_tag(),
            store = store.backend_tag(),
            registry = registry.backend_tag(),
            "orchestrator assembled"
        );
        Self {
            sources,
            store,
            registry,
            config,
            retry,
            audit: None,
        }
    }

    /// Emit audit events on `sender`. Ignored when auditing is disabled in
    /// the configuration.
    pub fn with_audit(mut self, sender: AuditSender) -> Self {
        if self.config.audit_enabled {
            self.audit = Some(sender);
        }
        self
    }

    pub fn config(&self) -> &CertifyConfig {
        &self.config
    }

    /// Backend tags of the source repository, artifact store and registry.
    pub fn backends(&self) -> [&'static str; 3] {
        [
            self.sources.backend_tag(),
            self.store.backend_tag(),
            self.registry.backend_tag(),
        ]
    }

    /// Certify one entry. Never panics and never returns an error: every
    /// failure is reported as an outcome variant.
    #[instrument(skip_all, fields(entry_id = %request.entry_id, force = request.force_reissue))]
    pub async fn certify(&self, request: CertificationRequest) -> CertificationOutcome {
        match self.run(&request).await {
            Ok(outcome) => {
                if let CertificationOutcome::Conflict { path, .. } = &outcome {
                    self.emit("certify", &request, "", false, Some(format!("conflict at {path}")));
                }
                outcome
            }
            Err(err) => {
                warn!(code = err.code(), %err, "certification failed");
                self.emit("certify", &request, "", false, Some(err.to_string()));
                err.into()
            }
        }
    }

    async fn run(&self, request: &CertificationRequest) -> Result<CertificationOutcome> {
        validate_entry_id(&request.entry_id)?;
        let entry_id = request.entry_id.as_str();
        let lane = request.lane.unwrap_or(self.config.default_lane);
        let base_url = request
            .verify_base_url
            .clone()
            .unwrap_or_else(|| self.config.verify_base_url.clone());
        check_verify_base_url(&base_url).map_err(MinutebookError::InvalidRequest)?;

        let pointer = with_retry("locate", &self.retry, || self.sources.locate(entry_id)).await?;
        let Some(pointer) = pointer else {
            info!("no source document for entry");
            return Ok(CertificationOutcome::NotFound {
                entry_id: entry_id.to_string(),
            });
        };

        let existing = with_retry("registry lookup", &self.retry, || self.registry.find(entry_id)).await?;
        if !request.force_reissue {
            if let Some(record) = existing.as_ref().filter(|r| r.level == VerificationLevel::Certified) {
                let present = with_retry("artifact check", &self.retry, || {
                    self.store.exists(&record.namespace, &record.path)
                })
                .await?;
                if present {
                    info!(path = %record.path, "reusing existing certification");
                    self.emit("reuse", request, &record.digest.to_hex(), true, None);
                    return Ok(success_from_record(record, true));
                }
                warn!(path = %record.path, "certified artifact missing from store, certifying again");
            }
        }

        let source = with_retry("download", &self.retry, || self.sources.fetch(&pointer)).await?;
        if let Some(expected) = &pointer.known_hash {
            verify_hash(&source, &expected.to_hex())?;
        }

        let metadata = CertificationMetadata::new(
            pointer.entity_label.clone(),
            lane,
            pointer.document_class.clone(),
            request
                .actor_id
                .clone()
                .unwrap_or_else(|| self.config.default_operator.clone()),
            request.certified_at.unwrap_or_else(Utc::now),
        );
        let certified_by = metadata.operator.clone();
        let certified_at = metadata.certified_at;
        let result = self.compute(source, metadata, base_url).await?;

        let bucket = self.config.bucket.clone();
        let path = artifact_path(lane, entry_id, &result.digest);
        let written = with_retry("upload", &self.retry, || {
            self.store
                .write(&bucket, &path, &result.bytes, request.force_reissue)
        })
        .await?;
        if written == WriteOutcome::Conflict {
            warn!(%bucket, %path, "artifact already exists, reissue not requested");
            return Ok(CertificationOutcome::Conflict { bucket, path });
        }

        let record = VerifiedRecord {
            id: existing.as_ref().map(|r| r.id).unwrap_or_default(),
            entry_id: entry_id.to_string(),
            namespace: bucket,
            path,
            digest: result.digest,
            embedded_digest: result.embedded_digest,
            verify_url: result.verification_url.clone(),
            byte_size: result.bytes.len() as u64,
            level: VerificationLevel::Certified,
            lane,
            certified_by,
            certified_at,
            converged: result.converged,
            forced_alignment: result.forced_alignment,
        };
        let expected = existing.as_ref().map(|r| r.digest);
        let registered = with_retry("registry upsert", &self.retry, || {
            self.registry.upsert(record.clone(), expected)
        })
        .await?;
        let stored = match registered {
            RegistryWrite::Stored(stored) => stored,
            RegistryWrite::Superseded(current) => {
                return Ok(self.lost_race(&record, current).await);
            }
        };

        let action = if request.force_reissue && existing.is_some() {
            "reissue"
        } else {
            "certify"
        };
        info!(
            action,
            path = %stored.path,
            digest = %stored.digest.short_hex(12),
            converged = stored.converged,
            forced_alignment = stored.forced_alignment,
            compositions = result.compositions,
            "entry certified"
        );
        self.emit(action, request, &stored.digest.to_hex(), true, None);
        Ok(success_from_record(&stored, false))
    }

    /// Another request certified the entry between our registry read and
    /// write. Drop our artifact unless the winner's record points at it, and
    /// report the winner's location as the conflict.
    async fn lost_race(
        &self,
        ours: &VerifiedRecord,
        current: Option<VerifiedRecord>,
    ) -> CertificationOutcome {
        let (bucket, path) = match &current {
            Some(winner) => (winner.namespace.clone(), winner.path.clone()),
            None => (ours.namespace.clone(), ours.path.clone()),
        };
        warn!(%bucket, %path, "entry certified concurrently, discarding this artifact");

        let shared = current
            .as_ref()
            .is_some_and(|winner| winner.namespace == ours.namespace && winner.path == ours.path);
        if !shared {
            match self.store.delete(&ours.namespace, &ours.path).await {
                Ok(_) => debug!(path = %ours.path, "orphaned artifact removed"),
                Err(err) => warn!(path = %ours.path, %err, "could not remove orphaned artifact"),
            }
        }
        CertificationOutcome::Conflict { bucket, path }
    }

    /// Run the resolver on the blocking pool under the configured deadline.
    ///
    /// On timeout the worker is told to stop; it finishes the composition in
    /// progress and exits without starting another.
    async fn compute(
        &self,
        source: Vec<u8>,
        metadata: CertificationMetadata,
        base_url: String,
    ) -> Result<CertificationResult> {
        let qr = QrOptions::from(self.config.qr);
        let resolver = FixedPointResolver::from_config(&self.config);
        let deadline = Duration::from_secs(self.config.compute_timeout_secs);

        let cancelled = Arc::new(AtomicBool::new(false));
        let worker_cancelled = Arc::clone(&cancelled);
        let task = tokio::task::spawn_blocking(move || {
            let composer = DocumentComposer::from_bytes(&source, metadata, qr)?;
            resolver.resolve_until(
                &composer,
                |candidate| build_verify_url(&base_url, candidate),
                &worker_cancelled,
            )
        });
        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(MinutebookError::Worker(join_err.to_string())),
            Err(_) => {
                cancelled.store(true, Ordering::Relaxed);
                Err(MinutebookError::ComputeTimeout(self.config.compute_timeout_secs))
            }
        }
    }

    fn emit(
        &self,
        action: &str,
        request: &CertificationRequest,
        document_hash: &str,
        success: bool,
        details: Option<String>,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };
        audit.emit(AuditEvent {
            action: action.to_string(),
            entry_id: request.entry_id.clone(),
            document_hash: document_hash.to_string(),
            actor: Some(metadata_operator(request, &self.config)),
            success,
            details,
        });
    }
}

fn metadata_operator(request: &CertificationRequest, config: &CertifyConfig) -> String {
    request
        .actor_id
        .clone()
        .unwrap_or_else(|| config.default_operator.clone())
}

fn success_from_record(record: &VerifiedRecord, reused: bool) -> CertificationOutcome {
    CertificationOutcome::Success {
        reused,
        verified_document_id: record.id,
        verify_url: record.verify_url.clone(),
        certified: CertifiedArtifact {
            bucket: record.namespace.clone(),
            path: record.path.clone(),
            hash: record.digest,
            byte_size: record.byte_size,
        },
        converged: record.converged,
        forced_alignment: record.forced_alignment,
    }
}
