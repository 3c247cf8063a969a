// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for minute-book certification.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MinutebookError;

/// Stable identifier of a verified-document registry record.
///
/// Survives forced reissues: the record is updated in place, the id is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifiedDocumentId(pub Uuid);

impl VerifiedDocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VerifiedDocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerifiedDocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VerifiedDocumentId {
    type Err = MinutebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| MinutebookError::Registry(format!("bad document id {s:?}: {e}")))
    }
}

/// A 256-bit content digest (SHA-256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 64;

    /// The all-zero sentinel used as the first fixed-point candidate.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex rendering (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex characters, used in content-addressed paths.
    pub fn short_hex(&self, len: usize) -> String {
        let mut full = self.to_hex();
        full.truncate(len.min(Self::HEX_LEN));
        full
    }

    /// Parse a 64-character hex digest (either case).
    pub fn from_hex(value: &str) -> Result<Self, MinutebookError> {
        if value.len() != Self::HEX_LEN {
            return Err(MinutebookError::InvalidRequest(format!(
                "digest must be {} hex chars, got {}",
                Self::HEX_LEN,
                value.len()
            )));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(value, &mut out)
            .map_err(|e| MinutebookError::InvalidRequest(format!("bad digest hex: {e}")))?;
        Ok(Self(out))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = MinutebookError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentDigest> for String {
    fn from(value: ContentDigest) -> Self {
        value.to_hex()
    }
}

/// Environment partition. Affects the storage destination only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Production,
    Sandbox,
}

impl Lane {
    /// Storage prefix for artifacts certified in this lane.
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            Self::Production => "minute-book",
            Self::Sandbox => "sandbox/minute-book",
        }
    }

    /// Label printed on the certification page.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Sandbox => "Sandbox",
        }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, Self::Sandbox)
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Sandbox => f.write_str("sandbox"),
        }
    }
}

impl std::str::FromStr for Lane {
    type Err = MinutebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(MinutebookError::InvalidRequest(format!(
                "unknown lane {other:?}"
            ))),
        }
    }
}

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% recovery.
    L,
    /// ~15% recovery. Balances symbol size and resilience.
    #[default]
    M,
    /// ~25% recovery.
    Q,
    /// ~30% recovery.
    H,
}

/// Verification level recorded in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    Certified,
    Revoked,
}

impl VerificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certified => "certified",
            Self::Revoked => "revoked",
        }
    }
}

impl std::str::FromStr for VerificationLevel {
    type Err = MinutebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certified" => Ok(Self::Certified),
            "revoked" => Ok(Self::Revoked),
            other => Err(MinutebookError::Registry(format!(
                "unknown verification level {other:?}"
            ))),
        }
    }
}

/// Metadata printed on the appended certification page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationMetadata {
    pub entity_label: String,
    pub lane: Lane,
    pub document_class: String,
    /// Who requested the certification.
    pub operator: String,
    /// Second precision, UTC.
    pub certified_at: DateTime<Utc>,
}

impl CertificationMetadata {
    /// Build metadata, truncating the timestamp to whole seconds.
    pub fn new(
        entity_label: impl Into<String>,
        lane: Lane,
        document_class: impl Into<String>,
        operator: impl Into<String>,
        certified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_label: entity_label.into(),
            lane,
            document_class: document_class.into(),
            operator: operator.into(),
            certified_at: certified_at.with_nanosecond(0).unwrap_or(certified_at),
        }
    }

    /// Timestamp as printed on the page.
    pub fn certified_at_label(&self) -> String {
        self.certified_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, timeout, or a busy backend. Safe to retry automatically.
    Transient,
    /// Caller must decide (e.g. reissue over an existing artifact).
    UserAction,
    /// Will fail the same way again with the same input.
    Permanent,
}

/// Append the `hash` query parameter to a verification base URL.
pub fn build_verify_url(base: &str, digest: &ContentDigest) -> String {
    let (head, fragment) = match base.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (base, None),
    };
    let separator = if !head.contains('?') {
        "?"
    } else if head.ends_with('?') || head.ends_with('&') {
        ""
    } else {
        "&"
    };
    let mut url = format!("{head}{separator}hash={}", digest.to_hex());
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Check that `base` can carry a verification hash: an http(s) URL whose
/// query does not already name a `hash` parameter. Returns the reason on
/// rejection.
pub fn check_verify_base_url(base: &str) -> Result<(), String> {
    if !base.starts_with("https://") && !base.starts_with("http://") {
        return Err(format!("verify_base_url must be an http(s) URL, got {base:?}"));
    }
    let head = base.split('#').next().unwrap_or(base);
    if let Some((_, query)) = head.split_once('?') {
        let names_hash = query
            .split('&')
            .any(|pair| pair.split('=').next() == Some("hash"));
        if names_hash {
            return Err(format!(
                "verify_base_url already has a hash parameter: {base:?}"
            ));
        }
    }
    Ok(())
}

/// Extract the `hash` query parameter from a verification URL.
pub fn hash_param(url: &str) -> Option<&str> {
    let query = url.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("hash="))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn digest_hex_roundtrip_and_prefix() {
        let digest = ContentDigest::from_bytes([0xab; 32]);
        let hex = digest.to_hex();
        assert_eq!(hex.len(), ContentDigest::HEX_LEN);
        assert_eq!(ContentDigest::from_hex(&hex).unwrap(), digest);
        assert_eq!(digest.short_hex(12), "abababababab");
    }

    #[test]
    fn digest_rejects_wrong_length() {
        assert!(ContentDigest::from_hex("abcd").is_err());
        assert!(ContentDigest::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn digest_serializes_as_hex_string() {
        let json = serde_json::to_string(&ContentDigest::ZERO).unwrap();
        assert_eq!(json, format!("\"{}\"", "0".repeat(64)));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ContentDigest::ZERO);
    }

    #[test]
    fn verify_url_appends_hash_param() {
        let digest = ContentDigest::from_bytes([1; 32]);
        let url = build_verify_url("https://example.org/verify.html", &digest);
        assert_eq!(
            url,
            format!("https://example.org/verify.html?hash={}", digest.to_hex())
        );
        assert_eq!(hash_param(&url), Some(digest.to_hex().as_str()));
    }

    #[test]
    fn verify_url_respects_existing_query_and_fragment() {
        let digest = ContentDigest::from_bytes([2; 32]);
        let url = build_verify_url("https://example.org/v?src=qr#top", &digest);
        assert!(url.starts_with("https://example.org/v?src=qr&hash="));
        assert!(url.ends_with("#top"));
        assert_eq!(hash_param(&url), Some(digest.to_hex().as_str()));
    }

    #[test]
    fn base_url_with_hash_param_is_rejected() {
        assert!(check_verify_base_url("https://example.org/verify.html").is_ok());
        assert!(check_verify_base_url("https://example.org/v?src=qr#hash=x").is_ok());
        assert!(check_verify_base_url("https://example.org/v?hashes=1").is_ok());

        assert!(check_verify_base_url("ftp://example.org/v").is_err());
        assert!(check_verify_base_url("https://x.org/verify?hash=deadbeef").is_err());
        assert!(check_verify_base_url("https://x.org/verify?src=qr&hash").is_err());
    }

    #[test]
    fn metadata_truncates_to_seconds() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(750);
        let meta = CertificationMetadata::new("Acme", Lane::Sandbox, "Resolution", "ops", ts);
        assert_eq!(meta.certified_at.nanosecond(), 0);
        assert_eq!(meta.certified_at_label(), "2026-03-01 12:30:45 UTC");
    }

    #[test]
    fn lane_parsing_and_prefix() {
        assert_eq!("production".parse::<Lane>().unwrap(), Lane::Production);
        assert_eq!("SANDBOX".parse::<Lane>().unwrap(), Lane::Sandbox);
        assert!("staging".parse::<Lane>().is_err());
        assert_eq!(Lane::Sandbox.storage_prefix(), "sandbox/minute-book");
    }
}
