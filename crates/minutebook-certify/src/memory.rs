// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborators for tests and embedding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use minutebook_core::error::{MinutebookError, Result};
use minutebook_core::types::ContentDigest;
use minutebook_security::digest;
use tokio::sync::Mutex;

use crate::ports::{
    ArtifactStore, RegistryWrite, SourcePointer, SourceRepository, VerifiedRecord, VerifiedRegistry,
    WriteOutcome,
};

/// Sources keyed by entry id.
#[derive(Default)]
pub struct MemorySourceRepository {
    entries: Mutex<HashMap<String, (SourcePointer, Vec<u8>)>>,
    /// Remaining fetches that fail with a transient error.
    failing_fetches: AtomicU32,
    fetch_calls: AtomicU32,
}

impl MemorySourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` for `entry_id`, recording their digest as the known hash.
    pub async fn insert(
        &self,
        entry_id: &str,
        entity_label: &str,
        document_class: &str,
        bytes: Vec<u8>,
    ) {
        let pointer = SourcePointer {
            entry_id: entry_id.to_string(),
            namespace: "sources".to_string(),
            path: format!("{entry_id}.pdf"),
            known_hash: Some(digest(&bytes)),
            entity_label: entity_label.to_string(),
            document_class: document_class.to_string(),
        };
        self.insert_pointer(pointer, bytes).await;
    }

    pub async fn insert_pointer(&self, pointer: SourcePointer, bytes: Vec<u8>) {
        self.entries
            .lock()
            .await
            .insert(pointer.entry_id.clone(), (pointer, bytes));
    }

    /// Make the next `count` fetches fail as if the network dropped.
    pub fn fail_next_fetches(&self, count: u32) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceRepository for MemorySourceRepository {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn locate(&self, entry_id: &str) -> Result<Option<SourcePointer>> {
        Ok(self
            .entries
            .lock()
            .await
            .get(entry_id)
            .map(|(pointer, _)| pointer.clone()))
    }

    async fn fetch(&self, pointer: &SourcePointer) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_fetches.store(remaining - 1, Ordering::SeqCst);
            return Err(MinutebookError::Download("connection reset".into()));
        }
        self.entries
            .lock()
            .await
            .get(&pointer.entry_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| MinutebookError::Download(format!("{} vanished", pointer.path)))
    }
}

/// Artifacts keyed by `(namespace, path)`.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    writes: AtomicU32,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remove(&self, namespace: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .remove(&(namespace.to_string(), path.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    /// Successful writes so far.
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn write(
        &self,
        namespace: &str,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<WriteOutcome> {
        let mut objects = self.objects.lock().await;
        let key = (namespace.to_string(), path.to_string());
        if !overwrite && objects.contains_key(&key) {
            return Ok(WriteOutcome::Conflict);
        }
        objects.insert(key, bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Written)
    }

    async fn exists(&self, namespace: &str, path: &str) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .await
            .contains_key(&(namespace.to_string(), path.to_string())))
    }

    async fn read(&self, namespace: &str, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .await
            .get(&(namespace.to_string(), path.to_string()))
            .cloned())
    }

    async fn delete(&self, namespace: &str, path: &str) -> Result<bool> {
        Ok(self.remove(namespace, path).await.is_some())
    }
}

/// Registry rows keyed by entry id.
#[derive(Default)]
pub struct MemoryRegistry {
    records: Mutex<HashMap<String, VerifiedRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl VerifiedRegistry for MemoryRegistry {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, entry_id: &str) -> Result<Option<VerifiedRecord>> {
        Ok(self.records.lock().await.get(entry_id).cloned())
    }

    async fn upsert(
        &self,
        mut record: VerifiedRecord,
        expected: Option<ContentDigest>,
    ) -> Result<RegistryWrite> {
        let mut records = self.records.lock().await;
        let current = records.get(&record.entry_id);
        if current.map(|r| r.digest) != expected {
            return Ok(RegistryWrite::Superseded(current.cloned()));
        }
        if let Some(existing) = current {
            record.id = existing.id;
        }
        records.insert(record.entry_id.clone(), record.clone());
        Ok(RegistryWrite::Stored(record))
    }

    async fn find_by_digest(&self, digest_hex: &str) -> Result<Option<VerifiedRecord>> {
        let wanted = digest_hex.to_ascii_lowercase();
        let records = self.records.lock().await;
        let by_content = records.values().find(|r| r.digest.to_hex() == wanted);
        let by_embedded = || records.values().find(|r| r.embedded_digest.to_hex() == wanted);
        Ok(by_content.or_else(by_embedded).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use minutebook_core::types::{Lane, VerificationLevel, VerifiedDocumentId};

    fn record(entry_id: &str, byte: u8) -> VerifiedRecord {
        VerifiedRecord {
            id: VerifiedDocumentId::new(),
            entry_id: entry_id.to_string(),
            namespace: "governance_certified".into(),
            path: format!("minute-book/{entry_id}.pdf"),
            digest: ContentDigest::from_bytes([byte; 32]),
            embedded_digest: ContentDigest::from_bytes([byte.wrapping_add(1); 32]),
            verify_url: String::new(),
            byte_size: 10,
            level: VerificationLevel::Certified,
            lane: Lane::Production,
            certified_by: "system".into(),
            certified_at: Utc::now(),
            converged: false,
            forced_alignment: true,
        }
    }

    #[tokio::test]
    async fn store_write_respects_overwrite_flag() {
        let store = MemoryArtifactStore::new();
        assert_eq!(store.write("b", "p.pdf", b"one", false).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.write("b", "p.pdf", b"two", false).await.unwrap(), WriteOutcome::Conflict);
        assert_eq!(store.read("b", "p.pdf").await.unwrap().unwrap(), b"one");

        assert_eq!(store.write("b", "p.pdf", b"two", true).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.read("b", "p.pdf").await.unwrap().unwrap(), b"two");
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn store_delete_reports_presence() {
        let store = MemoryArtifactStore::new();
        store.write("b", "p.pdf", b"one", false).await.unwrap();
        assert!(store.delete("b", "p.pdf").await.unwrap());
        assert!(!store.delete("b", "p.pdf").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn registry_upsert_keeps_id_and_single_row() {
        let registry = MemoryRegistry::new();
        let first = registry.upsert(record("e1", 1), None).await.unwrap().stored().unwrap();
        let second = registry
            .upsert(record("e1", 2), Some(first.digest))
            .await
            .unwrap()
            .stored()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.find("e1").await.unwrap().unwrap().digest, second.digest);
    }

    #[tokio::test]
    async fn registry_upsert_refuses_a_stale_expectation() {
        let registry = MemoryRegistry::new();
        let winner = registry.upsert(record("e1", 1), None).await.unwrap().stored().unwrap();

        // A second first-time writer.
        let late = registry.upsert(record("e1", 2), None).await.unwrap();
        assert_eq!(late, RegistryWrite::Superseded(Some(winner.clone())));

        // A writer that read an older row.
        let stale = registry
            .upsert(record("e1", 3), Some(ContentDigest::from_bytes([9; 32])))
            .await
            .unwrap();
        assert!(matches!(stale, RegistryWrite::Superseded(Some(_))));
        assert_eq!(registry.find("e1").await.unwrap().unwrap(), winner);

        // Expecting a row that does not exist.
        let phantom = registry.upsert(record("e2", 4), Some(winner.digest)).await.unwrap();
        assert_eq!(phantom, RegistryWrite::Superseded(None));
    }

    #[tokio::test]
    async fn registry_finds_by_either_digest() {
        let registry = MemoryRegistry::new();
        registry.upsert(record("e1", 0x10), None).await.unwrap();

        let content = ContentDigest::from_bytes([0x10; 32]).to_hex().to_uppercase();
        let embedded = ContentDigest::from_bytes([0x11; 32]).to_hex();
        assert!(registry.find_by_digest(&content).await.unwrap().is_some());
        assert!(registry.find_by_digest(&embedded).await.unwrap().is_some());
        assert!(registry.find_by_digest(&"0".repeat(64)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn source_fetch_can_fail_transiently() {
        let sources = MemorySourceRepository::new();
        sources.insert("e1", "Acme", "Minutes", b"%PDF".to_vec()).await;
        let pointer = sources.locate("e1").await.unwrap().unwrap();

        sources.fail_next_fetches(1);
        assert!(matches!(
            sources.fetch(&pointer).await,
            Err(MinutebookError::Download(_))
        ));
        assert_eq!(sources.fetch(&pointer).await.unwrap(), b"%PDF");
        assert_eq!(sources.fetch_calls(), 2);
        assert!(sources.locate("missing").await.unwrap().is_none());
    }
}
