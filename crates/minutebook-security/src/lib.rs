// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// minutebook-security — content hashing and the certification audit trail.
//
// The hashing utility is the single definition of "the digest of a document"
// used by the fixed-point resolver, the orchestrator, and verification. The
// audit trail is append-only and fed through a detached channel so that a
// slow or failing audit database never fails a certification request.

pub mod audit;
pub mod integrity;
pub mod sink;

pub use audit::{AuditEntry, AuditLog};
pub use integrity::{digest, hash_bytes, verify_hash};
pub use sink::{AuditEvent, AuditSender, AuditSink};
