// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SQLite registry of verified documents.
//
// Schema:
//   verified_documents(
//     id               TEXT PRIMARY KEY,      -- VerifiedDocumentId, stable across reissues
//     entry_id         TEXT NOT NULL UNIQUE,  -- one row per minute-book entry
//     namespace        TEXT NOT NULL,
//     path             TEXT NOT NULL,
//     digest           TEXT NOT NULL,         -- SHA-256 of the artifact
//     embedded_digest  TEXT NOT NULL,         -- digest the QR code carries
//     verify_url       TEXT NOT NULL,
//     byte_size        INTEGER NOT NULL,
//     level            TEXT NOT NULL,         -- "certified" | "revoked"
//     lane             TEXT NOT NULL,
//     certified_by     TEXT NOT NULL,
//     certified_at     TEXT NOT NULL,         -- RFC 3339
//     converged        INTEGER NOT NULL,
//     forced_alignment INTEGER NOT NULL
//   )

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use minutebook_core::error::{MinutebookError, Result};
use minutebook_core::types::{ContentDigest, VerificationLevel};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, instrument};

use crate::ports::{RegistryWrite, VerifiedRecord, VerifiedRegistry};

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS verified_documents (
    id               TEXT    PRIMARY KEY,
    entry_id         TEXT    NOT NULL UNIQUE,
    namespace        TEXT    NOT NULL,
    path             TEXT    NOT NULL,
    digest           TEXT    NOT NULL,
    embedded_digest  TEXT    NOT NULL,
    verify_url       TEXT    NOT NULL,
    byte_size        INTEGER NOT NULL,
    level            TEXT    NOT NULL,
    lane             TEXT    NOT NULL,
    certified_by     TEXT    NOT NULL,
    certified_at     TEXT    NOT NULL,
    converged        INTEGER NOT NULL,
    forced_alignment INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS verified_documents_digest ON verified_documents(digest);
CREATE INDEX IF NOT EXISTS verified_documents_embedded ON verified_documents(embedded_digest);";

const SELECT_COLUMNS: &str = "SELECT id, entry_id, namespace, path, digest, embedded_digest,
    verify_url, byte_size, level, lane, certified_by, certified_at, converged, forced_alignment
    FROM verified_documents";

fn db_err(e: rusqlite::Error) -> MinutebookError {
    MinutebookError::Registry(e.to_string())
}

/// Row as stored; converted to a [`VerifiedRecord`] after the query.
struct StoredRow {
    id: String,
    entry_id: String,
    namespace: String,
    path: String,
    digest: String,
    embedded_digest: String,
    verify_url: String,
    byte_size: i64,
    level: String,
    lane: String,
    certified_by: String,
    certified_at: String,
    converged: bool,
    forced_alignment: bool,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            namespace: row.get(2)?,
            path: row.get(3)?,
            digest: row.get(4)?,
            embedded_digest: row.get(5)?,
            verify_url: row.get(6)?,
            byte_size: row.get(7)?,
            level: row.get(8)?,
            lane: row.get(9)?,
            certified_by: row.get(10)?,
            certified_at: row.get(11)?,
            converged: row.get::<_, i32>(12)? != 0,
            forced_alignment: row.get::<_, i32>(13)? != 0,
        })
    }

    fn into_record(self) -> Result<VerifiedRecord> {
        let corrupt = |field: &str, detail: String| {
            MinutebookError::Registry(format!("corrupt {field} for {}: {detail}", self.entry_id))
        };
        let certified_at = DateTime::parse_from_rfc3339(&self.certified_at)
            .map_err(|e| corrupt("certified_at", e.to_string()))?
            .with_timezone(&Utc);
        let digest = ContentDigest::from_hex(&self.digest)
            .map_err(|e| corrupt("digest", e.to_string()))?;
        let embedded_digest = ContentDigest::from_hex(&self.embedded_digest)
            .map_err(|e| corrupt("embedded_digest", e.to_string()))?;
        let byte_size =
            u64::try_from(self.byte_size).map_err(|e| corrupt("byte_size", e.to_string()))?;

        Ok(VerifiedRecord {
            id: self.id.parse()?,
            level: self.level.parse::<VerificationLevel>()?,
            lane: self.lane.parse()?,
            entry_id: self.entry_id,
            namespace: self.namespace,
            path: self.path,
            digest,
            embedded_digest,
            verify_url: self.verify_url,
            byte_size,
            certified_by: self.certified_by,
            certified_at,
            converged: self.converged,
            forced_alignment: self.forced_alignment,
        })
    }
}

/// Verified-document registry backed by a SQLite database.
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteRegistry {
    /// Open (or create) the registry database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("registry opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MinutebookError::Registry("registry connection poisoned".into()))
    }

    /// Number of rows, one per certified entry.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM verified_documents", [], |row| {
                row.get(0)
            })
            .map_err(db_err)?;
        Ok(count as u64)
    }

    fn query_one(&self, condition: &str, value: &str) -> Result<Option<VerifiedRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE {condition} LIMIT 1");
        let row = self
            .conn()?
            .query_row(&sql, params![value], StoredRow::from_row)
            .optional()
            .map_err(db_err)?;
        row.map(StoredRow::into_record).transpose()
    }
}

#[async_trait]
impl VerifiedRegistry for SqliteRegistry {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn find(&self, entry_id: &str) -> Result<Option<VerifiedRecord>> {
        self.query_one("entry_id = ?1", entry_id)
    }

    #[instrument(skip(self, record), fields(entry_id = %record.entry_id))]
    async fn upsert(
        &self,
        record: VerifiedRecord,
        expected: Option<ContentDigest>,
    ) -> Result<RegistryWrite> {
        let byte_size = i64::try_from(record.byte_size)
            .map_err(|_| MinutebookError::Registry("artifact too large to record".into()))?;
        let expected_hex = expected.map(|digest| digest.to_hex());

        let written = {
            let mut conn = self.conn()?;
            // IMMEDIATE takes the write lock before the read, so other
            // processes sharing the file cannot slip in between.
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT digest FROM verified_documents WHERE entry_id = ?1",
                    params![record.entry_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            if current != expected_hex {
                false
            } else {
                tx.execute(
                    "INSERT INTO verified_documents
                     (id, entry_id, namespace, path, digest, embedded_digest, verify_url,
                      byte_size, level, lane, certified_by, certified_at, converged, forced_alignment)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT(entry_id) DO UPDATE SET
                        namespace = excluded.namespace,
                        path = excluded.path,
                        digest = excluded.digest,
                        embedded_digest = excluded.embedded_digest,
                        verify_url = excluded.verify_url,
                        byte_size = excluded.byte_size,
                        level = excluded.level,
                        lane = excluded.lane,
                        certified_by = excluded.certified_by,
                        certified_at = excluded.certified_at,
                        converged = excluded.converged,
                        forced_alignment = excluded.forced_alignment",
                    params![
                        record.id.to_string(),
                        record.entry_id,
                        record.namespace,
                        record.path,
                        record.digest.to_hex(),
                        record.embedded_digest.to_hex(),
                        record.verify_url,
                        byte_size,
                        record.level.as_str(),
                        record.lane.to_string(),
                        record.certified_by,
                        record.certified_at.to_rfc3339(),
                        record.converged as i32,
                        record.forced_alignment as i32,
                    ],
                )
                .map_err(db_err)?;
                tx.commit().map_err(db_err)?;
                true
            }
        };

        let current = self.query_one("entry_id = ?1", &record.entry_id)?;
        if !written {
            debug!("registry row changed since it was read, not written");
            return Ok(RegistryWrite::Superseded(current));
        }
        debug!("registry record upserted");
        current
            .map(RegistryWrite::Stored)
            .ok_or_else(|| MinutebookError::Registry("upserted row not readable".into()))
    }

    async fn find_by_digest(&self, digest_hex: &str) -> Result<Option<VerifiedRecord>> {
        let wanted = digest_hex.to_ascii_lowercase();
        match self.query_one("digest = ?1", &wanted)? {
            Some(record) => Ok(Some(record)),
            None => self.query_one("embedded_digest = ?1", &wanted),
        }
    }
}
