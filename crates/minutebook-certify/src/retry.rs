// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry with exponential backoff + jitter for storage and registry calls.
//
// Only `ErrorClass::Transient` failures are retried. Everything the
// orchestrator repeats is idempotent: downloads are reads, the artifact path
// is content-addressed, and the registry write is an upsert.

use std::future::Future;
use std::time::Duration;

use minutebook_core::config::RetrySettings;
use minutebook_core::error::MinutebookError;
use minutebook_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry; the error is permanent or needs the caller.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &MinutebookError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match err.class() {
        ErrorClass::Permanent => RetryDecision::GiveUp(ErrorClass::Permanent),
        ErrorClass::UserAction => RetryDecision::GiveUp(ErrorClass::UserAction),
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                RetryDecision::Exhausted
            } else {
                RetryDecision::RetryAfter(compute_delay(attempt, config))
            }
        }
    }
}

/// Run `operation` until it succeeds, fails non-transiently, or runs out of
/// retries. `label` names the step in logs.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, MinutebookError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MinutebookError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(step = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        match should_retry(&err, attempt, config) {
            RetryDecision::RetryAfter(delay) => {
                debug!(step = label, attempt, delay_ms = delay.as_millis() as u64, %err, "scheduling retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::GiveUp(class) => {
                debug!(step = label, ?class, %err, "not retrying");
                return Err(err);
            }
            RetryDecision::Exhausted => {
                warn!(step = label, attempt, max = config.max_retries, %err, "retry limit exhausted");
                return Err(err);
            }
        }
    }
}

/// Compute exponential backoff delay with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);

    Duration::from_millis(capped_ms)
}

/// Deterministic spread in [0, base) derived from the attempt number.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
