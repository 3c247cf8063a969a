// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certification configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MinutebookError, Result};
use crate::types::{ErrorCorrection, Lane, check_verify_base_url};

/// QR rendering settings for the certification page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrSettings {
    pub pixels_per_module: u32,
    /// Quiet zone width, in modules.
    pub margin_modules: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            pixels_per_module: 4,
            margin_modules: 4,
            error_correction: ErrorCorrection::M,
        }
    }
}

/// Backoff settings for transient storage/registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Persistent certification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertifyConfig {
    /// Base of the verification URL; the `hash` parameter is appended.
    pub verify_base_url: String,
    /// Artifact namespace (bucket) certified documents are written to.
    pub bucket: String,
    /// Lane used when a request does not name one.
    pub default_lane: Lane,
    pub max_fast_iterations: u32,
    pub max_polish_iterations: u32,
    pub qr: QrSettings,
    /// Hard deadline for the compose/hash loop of one request.
    pub compute_timeout_secs: u64,
    pub retry: RetrySettings,
    /// Operator label used when a request carries no actor.
    pub default_operator: String,
    /// Emit audit events after successful certifications.
    pub audit_enabled: bool,
}

impl Default for CertifyConfig {
    fn default() -> Self {
        Self {
            verify_base_url: "https://records.example.org/verify.html".into(),
            bucket: "governance_certified".into(),
            default_lane: Lane::Production,
            max_fast_iterations: 16,
            max_polish_iterations: 6,
            qr: QrSettings::default(),
            compute_timeout_secs: 60,
            retry: RetrySettings::default(),
            default_operator: "system".into(),
            audit_enabled: true,
        }
    }
}

impl CertifyConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the certification pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        check_verify_base_url(&self.verify_base_url).map_err(MinutebookError::Config)?;
        if self.bucket.trim().is_empty() || self.bucket.contains("..") {
            return Err(MinutebookError::Config("bucket must be a plain name".into()));
        }
        if self.max_fast_iterations == 0 {
            return Err(MinutebookError::Config(
                "max_fast_iterations must be at least 1".into(),
            ));
        }
        if self.qr.pixels_per_module == 0 {
            return Err(MinutebookError::Config(
                "qr.pixels_per_module must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
