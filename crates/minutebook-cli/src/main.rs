// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minutebook — deterministic certification of minute-book entries.
//
// Entry point. Initialises logging, parses the command line, wires the
// filesystem/SQLite backends and runs one command.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use minutebook_certify::{CertificationRequest, SqliteRegistry, verify_artifact};
use minutebook_core::error::Result;
use minutebook_core::types::Lane;
use minutebook_security::AuditLog;

use services::{Locations, Services, load_config};

#[derive(Debug, Parser)]
#[command(name = "minutebook")]
#[command(about = "Certify minute-book entries with a self-verifying QR page", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Certify one entry and print the JSON outcome.
    Certify {
        /// Minute-book entry identifier ([A-Za-z0-9_-], up to 128 chars).
        #[arg(long)]
        entry_id: String,

        /// production or sandbox; the configured default otherwise.
        #[arg(long)]
        lane: Option<Lane>,

        /// Operator label printed on the certification page.
        #[arg(long)]
        actor: Option<String>,

        /// Re-certify and overwrite an existing artifact.
        #[arg(long)]
        force: bool,

        /// Override the verification base URL.
        #[arg(long)]
        verify_base_url: Option<String>,

        /// Directory of `<entry_id>.json` source manifests.
        #[arg(long)]
        sources: PathBuf,

        /// Root directory of the artifact store.
        #[arg(long)]
        store: PathBuf,

        /// SQLite registry of verified documents.
        #[arg(long)]
        registry: PathBuf,

        /// SQLite audit log; auditing is skipped when omitted.
        #[arg(long)]
        audit: Option<PathBuf>,

        /// JSON configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check a PDF against the registry.
    Verify {
        file: PathBuf,

        #[arg(long)]
        registry: PathBuf,
    },
    /// Show recent audit entries, newest first.
    History {
        #[arg(long)]
        audit: PathBuf,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "command failed");
            ExitCode::from(2)
        }
    }
}

/// Run one command. `Ok(false)` means the command ran but reported a negative
/// result (failed certification, unverified file).
async fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Certify {
            entry_id,
            lane,
            actor,
            force,
            verify_base_url,
            sources,
            store,
            registry,
            audit,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let locations = Locations {
                sources,
                store,
                registry,
                audit,
            };
            let services = Services::open(&locations, config)?;
            let request = CertificationRequest {
                entry_id,
                actor_id: actor,
                lane,
                force_reissue: force,
                verify_base_url,
                certified_at: None,
            };

            let outcome = services.orchestrator.certify(request).await;
            services.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
            Ok(outcome.is_ok())
        }
        Commands::Verify { file, registry } => {
            let bytes = tokio::fs::read(&file).await?;
            let registry = SqliteRegistry::open(&registry)?;
            let report = verify_artifact(&bytes, &registry).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.is_authentic())
        }
        Commands::History { audit, limit } => {
            let log = AuditLog::open(&audit)?;
            for entry in log.recent_entries(limit)? {
                println!("{}", serde_json::to_string(&entry)?);
            }
            Ok(true)
        }
    }
}
