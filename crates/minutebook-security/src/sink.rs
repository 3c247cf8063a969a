// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detached audit side channel.
//
// Producers hold an `AuditSender` and never wait on the database: `emit` only
// pushes onto an unbounded channel. A single consumer task owns the
// `AuditLog` and writes events in arrival order. Write failures are logged
// and dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audit::AuditLog;

/// One certification outcome destined for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub entry_id: String,
    pub document_hash: String,
    pub actor: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

/// Cheap, cloneable handle for emitting audit events.
#[derive(Debug, Clone)]
pub struct AuditSender {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl AuditSender {
    /// Queue an event. Never blocks and never fails the caller.
    pub fn emit(&self, event: AuditEvent) {
        if let Err(err) = self.tx.send(event) {
            warn!(entry_id = %err.0.entry_id, "audit consumer gone, event dropped");
        }
    }
}

/// Consumer side of the audit channel.
pub struct AuditSink;

impl AuditSink {
    /// Spawn the consumer task on the current tokio runtime.
    ///
    /// The task ends once every `AuditSender` clone has been dropped and the
    /// queue is drained; await the handle to flush on shutdown.
    pub fn spawn(log: AuditLog) -> (AuditSender, JoinHandle<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(consume(log, rx));
        (AuditSender { tx }, handle)
    }
}

/// Drain the channel into the log. Returns the number of events written.
async fn consume(log: AuditLog, mut rx: mpsc::UnboundedReceiver<AuditEvent>) -> u64 {
    let mut written = 0u64;
    while let Some(event) = rx.recv().await {
        match log.record(
            &event.action,
            &event.entry_id,
            &event.document_hash,
            event.actor.as_deref(),
            event.success,
            event.details.as_deref(),
        ) {
            Ok(()) => {
                written += 1;
                debug!(entry_id = %event.entry_id, action = %event.action, "audit event written");
            }
            Err(err) => {
                warn!(entry_id = %event.entry_id, error = %err, "audit write failed");
            }
        }
    }
    info!(written, "audit consumer stopped");
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(entry_id: &str) -> AuditEvent {
        AuditEvent {
            action: "certify".into(),
            entry_id: entry_id.into(),
            document_hash: "ab".repeat(32),
            actor: Some("ops".into()),
            success: true,
            details: None,
        }
    }

    #[tokio::test]
    async fn events_are_flushed_when_senders_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let (sender, handle) = AuditSink::spawn(AuditLog::open(&path).unwrap());

        sender.emit(event("e1"));
        sender.clone().emit(event("e2"));
        drop(sender);

        assert_eq!(handle.await.unwrap(), 2);
        let log = AuditLog::open(&path).unwrap();
        assert_eq!(log.count().unwrap(), 2);
        assert_eq!(log.entries_for_entry("e2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn emit_after_consumer_stops_does_not_panic() {
        let (sender, handle) = AuditSink::spawn(AuditLog::open_in_memory().unwrap());
        handle.abort();
        let _ = handle.await;
        sender.emit(event("late"));
    }
}
