// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service wiring — opens the stores, registry and audit log named on the
// command line and assembles an orchestrator around them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minutebook_certify::{FsArtifactStore, FsSourceRepository, Orchestrator, SqliteRegistry};
use minutebook_core::CertifyConfig;
use minutebook_core::error::Result;
use minutebook_security::{AuditLog, AuditSink};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Locations of everything a certification run touches.
#[derive(Debug, Clone)]
pub struct Locations {
    pub sources: PathBuf,
    pub store: PathBuf,
    pub registry: PathBuf,
    pub audit: Option<PathBuf>,
}

/// Load the configuration file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<CertifyConfig> {
    match path {
        Some(path) => {
            let config = CertifyConfig::load(path)?;
            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(CertifyConfig::default()),
    }
}

/// An orchestrator plus the audit consumer that must be flushed on exit.
pub struct Services {
    pub orchestrator: Orchestrator,
    audit_task: Option<JoinHandle<u64>>,
}

impl Services {
    /// Open all backends. Must run inside a tokio runtime (the audit consumer
    /// is spawned onto it).
    pub fn open(locations: &Locations, config: CertifyConfig) -> Result<Self> {
        info!(
            sources = %locations.sources.display(),
            store = %locations.store.display(),
            registry = %locations.registry.display(),
            "initialising services"
        );
        let registry = SqliteRegistry::open(&locations.registry)?;
        let audit_enabled = config.audit_enabled;
        let mut orchestrator = Orchestrator::new(
            Arc::new(FsSourceRepository::new(&locations.sources)),
            Arc::new(FsArtifactStore::new(&locations.store)),
            Arc::new(registry),
            config,
        );
        let [sources, store, registry] = orchestrator.backends();
        info!(sources, store, registry, "backends ready");

        let mut audit_task = None;
        match (&locations.audit, audit_enabled) {
            (Some(path), true) => {
                let (sender, handle) = AuditSink::spawn(AuditLog::open(path)?);
                orchestrator = orchestrator.with_audit(sender);
                audit_task = Some(handle);
            }
            (Some(_), false) => warn!("audit path given but auditing is disabled in the configuration"),
            (None, _) => {}
        }

        Ok(Self {
            orchestrator,
            audit_task,
        })
    }

    /// Drop the orchestrator and wait for queued audit events to be written.
    pub async fn shutdown(self) {
        let Self {
            orchestrator,
            audit_task,
        } = self;
        drop(orchestrator);
        if let Some(task) = audit_task {
            match task.await {
                Ok(written) => info!(written, "audit log flushed"),
                Err(err) => warn!(%err, "audit consumer did not finish cleanly"),
            }
        }
    }
}
