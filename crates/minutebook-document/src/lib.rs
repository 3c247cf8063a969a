// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// minutebook-document — Document processing for minute-book certification.
//
// Provides the QR rasterizer (URL to monochrome bitmap) and the PDF composer
// (copy every source page untouched, append one certification page carrying
// the QR code, serialise deterministically). Everything here is pure: bytes
// in, bytes out, no I/O.

pub mod pdf;
pub mod qr;

// Re-export the primary structs so callers can use `minutebook_document::DocumentComposer` etc.
pub use pdf::composer::DocumentComposer;
pub use pdf::deterministic::serialize_deterministically;
pub use pdf::source::SourceDocument;
pub use qr::rasterizer::{MonochromeBitmap, QrOptions, rasterize};
