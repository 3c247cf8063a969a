// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-point hash resolver.
//
// The certification page carries a QR code whose URL names the SHA-256 of the
// finished file, so the bytes depend on their own digest. The resolver
// iterates compose -> hash -> compose until the embedded digest reproduces
// itself, and falls back to forced alignment when the budget runs out:
//
//   FAST -> (CONVERGED | POLISH) -> (CONVERGED | FORCE_ALIGN) -> DONE
//
// Whatever path is taken, `sha256(result.bytes) == result.digest` and the
// returned URL carries `result.digest`. A result is `converged` exactly when
// the QR code embeds `result.digest`; otherwise it is the forced-alignment
// output, whose QR code embeds `result.embedded_digest`.

use std::sync::atomic::{AtomicBool, Ordering};

use minutebook_core::config::CertifyConfig;
use minutebook_core::error::MinutebookError;
use minutebook_core::types::ContentDigest;
use minutebook_document::DocumentComposer;
use minutebook_security::digest;
use tracing::{debug, info, instrument, warn};

/// Anything that can render a certified document for a given URL.
pub trait Compose {
    fn compose(&self, verification_url: &str) -> Result<Vec<u8>, MinutebookError>;
}

impl Compose for DocumentComposer {
    fn compose(&self, verification_url: &str) -> Result<Vec<u8>, MinutebookError> {
        DocumentComposer::compose(self, verification_url)
    }
}

/// Output of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationResult {
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`.
    pub digest: ContentDigest,
    /// Verification URL for `digest`.
    pub verification_url: String,
    /// Digest the QR code inside `bytes` actually encodes.
    pub embedded_digest: ContentDigest,
    pub converged: bool,
    pub forced_alignment: bool,
    /// Compose-and-hash cycles performed.
    pub compositions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fast,
    Polish,
}

/// Bounded fixed-point search over compose-then-hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointResolver {
    max_fast_iterations: u32,
    max_polish_iterations: u32,
}

impl Default for FixedPointResolver {
    fn default() -> Self {
        Self::from_config(&CertifyConfig::default())
    }
}

impl FixedPointResolver {
    pub fn new(max_fast_iterations: u32, max_polish_iterations: u32) -> Self {
        Self {
            max_fast_iterations,
            max_polish_iterations,
        }
    }

    pub fn from_config(config: &CertifyConfig) -> Self {
        Self::new(config.max_fast_iterations, config.max_polish_iterations)
    }

    /// Upper bound on compositions for one [`resolve`](Self::resolve) call.
    pub fn max_compositions(&self) -> u32 {
        self.max_fast_iterations + self.max_polish_iterations + 2
    }

    /// Search for bytes whose embedded URL names their own digest.
    ///
    /// Only composition errors are returned; running out of iterations is
    /// reported through `forced_alignment`, never as an error.
    pub fn resolve<C, U>(&self, composer: &C, url_for: U) -> Result<CertificationResult, MinutebookError>
    where
        C: Compose + ?Sized,
        U: Fn(&ContentDigest) -> String,
    {
        self.resolve_until(composer, url_for, &AtomicBool::new(false))
    }

    /// [`resolve`](Self::resolve), abandoned with a `Worker` error once
    /// `cancelled` is set. The flag is checked before every composition.
    #[instrument(skip_all, fields(fast = self.max_fast_iterations, polish = self.max_polish_iterations))]
    pub fn resolve_until<C, U>(
        &self,
        composer: &C,
        url_for: U,
        cancelled: &AtomicBool,
    ) -> Result<CertificationResult, MinutebookError>
    where
        C: Compose + ?Sized,
        U: Fn(&ContentDigest) -> String,
    {
        let mut cycle = Cycle {
            composer,
            url_for: &url_for,
            cancelled,
            compositions: 0,
        };
        let mut candidate = ContentDigest::ZERO;

        for (phase, limit) in [
            (Phase::Fast, self.max_fast_iterations),
            (Phase::Polish, self.max_polish_iterations),
        ] {
            for iteration in 0..limit {
                let (bytes, hash) = cycle.run(&candidate)?;
                debug!(?phase, iteration, digest = %hash.short_hex(12), "compose cycle");
                if hash == candidate {
                    if phase == Phase::Polish {
                        info!(compositions = cycle.compositions, "converged on the slow path");
                    } else {
                        debug!(compositions = cycle.compositions, "converged");
                    }
                    return Ok(cycle.finish(bytes, hash, hash, true, false));
                }
                candidate = hash;
            }
        }

        // One more cycle with the last candidate may still land on a fixed point.
        let (bytes, hash) = cycle.run(&candidate)?;
        if hash == candidate {
            info!(compositions = cycle.compositions, "converged during alignment");
            return Ok(cycle.finish(bytes, hash, hash, true, false));
        }

        // Embed the digest just observed; report the digest of what we return.
        let (aligned, aligned_hash) = cycle.run(&hash)?;
        if aligned_hash == hash {
            info!(compositions = cycle.compositions, "converged on the final cycle");
            return Ok(cycle.finish(aligned, aligned_hash, hash, true, false));
        }
        warn!(
            compositions = cycle.compositions,
            embedded = %hash.short_hex(12),
            digest = %aligned_hash.short_hex(12),
            "fixed point not reached, forced alignment applied"
        );
        Ok(cycle.finish(aligned, aligned_hash, hash, false, true))
    }
}

struct Cycle<'a, C: ?Sized, U> {
    composer: &'a C,
    url_for: &'a U,
    cancelled: &'a AtomicBool,
    compositions: u32,
}

impl<C, U> Cycle<'_, C, U>
where
    C: Compose + ?Sized,
    U: Fn(&ContentDigest) -> String,
{
    fn run(&mut self, candidate: &ContentDigest) -> Result<(Vec<u8>, ContentDigest), MinutebookError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(MinutebookError::Worker(format!(
                "resolution cancelled after {} compositions",
                self.compositions
            )));
        }
        self.compositions += 1;
        let bytes = self.composer.compose(&(self.url_for)(candidate))?;
        let hash = digest(&bytes);
        Ok((bytes, hash))
    }

    fn finish(
        &self,
        bytes: Vec<u8>,
        digest: ContentDigest,
        embedded_digest: ContentDigest,
        converged: bool,
        forced_alignment: bool,
    ) -> CertificationResult {
        CertificationResult {
            bytes,
            digest,
            verification_url: (self.url_for)(&digest),
            embedded_digest,
            converged,
            forced_alignment,
            compositions: self.compositions,
        }
    }
}
