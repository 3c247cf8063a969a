// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR module — verification URL to monochrome raster.

pub mod rasterizer;

pub use rasterizer::{MonochromeBitmap, QrOptions, rasterize};
