// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// minutebook-certify — fixed-point resolution, collaborator ports and their
// adapters, and the certification orchestrator.

pub mod fs_source;
pub mod fs_store;
pub mod memory;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use fs_source::FsSourceRepository;
pub use fs_store::FsArtifactStore;
pub use memory::{MemoryArtifactStore, MemoryRegistry, MemorySourceRepository};
pub use orchestrator::{CertificationOutcome, CertificationRequest, CertifiedArtifact, Orchestrator};
pub use ports::{
    ArtifactStore, RegistryWrite, SourcePointer, SourceRepository, VerifiedRecord, VerifiedRegistry,
    WriteOutcome,
};
pub use registry::SqliteRegistry;
pub use resolver::{CertificationResult, Compose, FixedPointResolver};
pub use retry::{RetryConfig, with_retry};
pub use verify::{VerificationReport, VerificationStatus, verify_artifact};
