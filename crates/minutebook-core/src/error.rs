// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Minutebook.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all Minutebook operations.
#[derive(Debug, Error)]
pub enum MinutebookError {
    // -- Request errors --
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("source document not found: {0}")]
    SourceNotFound(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("QR encoding failed: {0}")]
    QrEncoding(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("certification compute exceeded {0}s deadline")]
    ComputeTimeout(u64),

    #[error("certification worker failed: {0}")]
    Worker(String),

    // -- Storage / persistence --
    #[error("source download failed: {0}")]
    Download(String),

    #[error("artifact upload failed: {0}")]
    Upload(String),

    #[error("artifact already exists at {namespace}/{path}")]
    AlreadyExists { namespace: String, path: String },

    #[error("registry error: {0}")]
    Registry(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MinutebookError {
    /// Stable error code reported to callers in failure responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::Config(_) => "INVALID_REQUEST",
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::PdfError(_) | Self::QrEncoding(_) | Self::ImageError(_) => "COMPOSITION_FAILED",
            Self::IntegrityMismatch { .. } => "SOURCE_HASH_MISMATCH",
            Self::ComputeTimeout(_) => "COMPUTE_TIMEOUT",
            Self::Worker(_) => "INTERNAL_ERROR",
            Self::Download(_) => "DOWNLOAD_FAILED",
            Self::Upload(_) | Self::Io(_) => "UPLOAD_FAILED",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS_CONFLICT",
            Self::Registry(_) | Self::Database(_) | Self::Serialization(_) => {
                "REGISTRY_WRITE_FAILED"
            }
        }
    }

    /// Classify the error for retry decisions.
    ///
    /// Only transient failures are retried automatically; the core computation
    /// is a pure function of its inputs so repeating it is always safe.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Download(_)
            | Self::Upload(_)
            | Self::Registry(_)
            | Self::Database(_)
            | Self::ComputeTimeout(_)
            | Self::Worker(_) => ErrorClass::Transient,

            Self::AlreadyExists { .. } | Self::SourceNotFound(_) => ErrorClass::UserAction,

            Self::InvalidRequest(_)
            | Self::Config(_)
            | Self::PdfError(_)
            | Self::QrEncoding(_)
            | Self::ImageError(_)
            | Self::IntegrityMismatch { .. }
            | Self::Serialization(_) => ErrorClass::Permanent,

            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ErrorClass::UserAction
                }
                _ => ErrorClass::Transient,
            },
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MinutebookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_external_code() {
        let err = MinutebookError::AlreadyExists {
            namespace: "minute-book".into(),
            path: "minute-book/e1-abc.pdf".into(),
        };
        assert_eq!(err.code(), "ALREADY_EXISTS_CONFLICT");
        assert_eq!(err.class(), ErrorClass::UserAction);
    }

    #[test]
    fn network_failures_are_transient() {
        let err = MinutebookError::Upload("connection reset".into());
        assert_eq!(err.class(), ErrorClass::Transient);

        let io = MinutebookError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "slow disk",
        ));
        assert_eq!(io.class(), ErrorClass::Transient);
    }

    #[test]
    fn malformed_pdf_is_permanent() {
        let err = MinutebookError::PdfError("no trailer".into());
        assert_eq!(err.code(), "COMPOSITION_FAILED");
        assert_eq!(err.class(), ErrorClass::Permanent);
    }
}
