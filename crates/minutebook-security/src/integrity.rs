// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document integrity — SHA-256 content digests.

use minutebook_core::error::MinutebookError;
use minutebook_core::types::ContentDigest;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data`.
pub fn digest(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentDigest::from_bytes(hasher.finalize().into())
}

/// Compute the SHA-256 hash of `data` as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    digest(data).to_hex()
}

/// Verify that `data` matches the expected SHA-256 hex digest.
///
/// Comparison is case-insensitive on the expected value.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<(), MinutebookError> {
    let actual = hash_bytes(data);
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(MinutebookError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}
