// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail — append-only SQLite log of every certification outcome.
//
// Schema:
//   audit_log(
//     id            INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp     TEXT    NOT NULL,   -- RFC 3339
//     action        TEXT    NOT NULL,   -- "certify", "reissue", "reuse"
//     entry_id      TEXT    NOT NULL,   -- minute-book entry identifier
//     document_hash TEXT    NOT NULL,   -- SHA-256 hex digest of the artifact
//     actor         TEXT,               -- operator label
//     success       INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details       TEXT                -- optional free-form context
//   )

use std::path::Path;

use chrono::Utc;
use minutebook_core::error::MinutebookError;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS audit_log (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp     TEXT    NOT NULL,
    action        TEXT    NOT NULL,
    entry_id      TEXT    NOT NULL,
    document_hash TEXT    NOT NULL,
    actor         TEXT,
    success       INTEGER NOT NULL,
    details       TEXT
);
CREATE INDEX IF NOT EXISTS audit_log_entry ON audit_log(entry_id);";

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, action, entry_id, document_hash, actor, success, details FROM audit_log";

/// Convert a `rusqlite::Error` into a `MinutebookError::Database`.
fn db_err(e: rusqlite::Error) -> MinutebookError {
    MinutebookError::Database(e.to_string())
}

/// A single entry in the audit log, used for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub entry_id: String,
    pub document_hash: String,
    pub actor: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

impl AuditEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            action: row.get(2)?,
            entry_id: row.get(3)?,
            document_hash: row.get(4)?,
            actor: row.get(5)?,
            success: row.get::<_, i32>(6)? != 0,
            details: row.get(7)?,
        })
    }
}

/// Append-only audit log backed by a SQLite database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    ///
    /// WAL mode is enabled so the CLI can read history while a certification
    /// run is appending.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MinutebookError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self, MinutebookError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    /// Record a new audit entry.
    #[instrument(skip(self, details), fields(%action, %entry_id, success))]
    pub fn record(
        &self,
        action: &str,
        entry_id: &str,
        document_hash: &str,
        actor: Option<&str>,
        success: bool,
        details: Option<&str>,
    ) -> Result<(), MinutebookError> {
        let timestamp = Utc::now().to_rfc3339();
        let success_int: i32 = if success { 1 } else { 0 };

        self.conn
            .execute(
                "INSERT INTO audit_log
                 (timestamp, action, entry_id, document_hash, actor, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    timestamp,
                    action,
                    entry_id,
                    document_hash,
                    actor,
                    success_int,
                    details
                ],
            )
            .map_err(db_err)?;

        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for one minute-book entry, oldest first.
    pub fn entries_for_entry(&self, entry_id: &str) -> Result<Vec<AuditEntry>, MinutebookError> {
        let sql = format!("{SELECT_COLUMNS} WHERE entry_id = ?1 ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![entry_id], AuditEntry::from_row)
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    /// Retrieve the most recent `limit` entries, ordered newest-first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, MinutebookError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit], AuditEntry::from_row)
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    /// Return the total number of entries in the audit log.
    pub fn count(&self) -> Result<u64, MinutebookError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }
}
