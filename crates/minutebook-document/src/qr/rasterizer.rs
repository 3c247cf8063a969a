// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR rasterizer — encodes a string with the `qrcode` crate and paints the
// module matrix into a white-background grayscale bitmap with a quiet zone.

use image::codecs::png::PngEncoder;
use image::{GrayImage, Luma};
use minutebook_core::config::QrSettings;
use minutebook_core::error::MinutebookError;
use minutebook_core::types::ErrorCorrection;
use qrcode::{Color, EcLevel, QrCode};
use tracing::{debug, instrument};

const DARK: Luma<u8> = Luma([0u8]);
const LIGHT: Luma<u8> = Luma([255u8]);

/// Rendering options for [`rasterize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Edge length of one QR module, in pixels.
    pub pixels_per_module: u32,
    /// Quiet zone on every side, in modules.
    pub margin_modules: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for QrOptions {
    fn default() -> Self {
        QrSettings::default().into()
    }
}

impl From<QrSettings> for QrOptions {
    fn from(settings: QrSettings) -> Self {
        Self {
            pixels_per_module: settings.pixels_per_module,
            margin_modules: settings.margin_modules,
            error_correction: settings.error_correction,
        }
    }
}

fn ec_level(level: ErrorCorrection) -> EcLevel {
    match level {
        ErrorCorrection::L => EcLevel::L,
        ErrorCorrection::M => EcLevel::M,
        ErrorCorrection::Q => EcLevel::Q,
        ErrorCorrection::H => EcLevel::H,
    }
}

/// A square black-on-white raster of a QR symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeBitmap {
    image: GrayImage,
    /// Modules per side, excluding the quiet zone.
    modules: u32,
}

impl MonochromeBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Modules per side of the symbol itself (version 1 = 21).
    pub fn modules(&self) -> u32 {
        self.modules
    }

    /// Whether the pixel at (`x`, `y`) is black. Out-of-range reads are white.
    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.image.get_pixel(x, y)[0] == 0
    }

    /// Borrow the underlying 8-bit grayscale image.
    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    /// Pack as 1 bit per pixel, MSB first, rows padded to whole bytes,
    /// 1 = white. This is the sample layout of a PDF `DeviceGray` image with
    /// `BitsPerComponent 1`.
    pub fn to_packed_bits(&self) -> Vec<u8> {
        let width = self.width() as usize;
        let row_bytes = width.div_ceil(8);
        let mut out = vec![0u8; row_bytes * self.height() as usize];

        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel[0] != 0 {
                let index = y as usize * row_bytes + x as usize / 8;
                out[index] |= 0x80 >> (x % 8);
            }
        }
        out
    }

    /// Encode as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, MinutebookError> {
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new(&mut buffer);
        self.image.write_with_encoder(encoder).map_err(|err| {
            MinutebookError::ImageError(format!("PNG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }
}

/// Encode `text` as a QR symbol and paint it.
///
/// Output depends only on `text` and `opts`. Empty text, text beyond the
/// capacity of the chosen error-correction level, and a zero module size are
/// rejected with [`MinutebookError::QrEncoding`].
#[instrument(skip(text), fields(text_len = text.len(), ec = ?opts.error_correction))]
pub fn rasterize(text: &str, opts: &QrOptions) -> Result<MonochromeBitmap, MinutebookError> {
    if text.is_empty() {
        return Err(MinutebookError::QrEncoding("cannot encode empty text".into()));
    }
    if opts.pixels_per_module == 0 {
        return Err(MinutebookError::QrEncoding(
            "pixels_per_module must be at least 1".into(),
        ));
    }

    let code = QrCode::with_error_correction_level(text.as_bytes(), ec_level(opts.error_correction))
        .map_err(|err| {
            MinutebookError::QrEncoding(format!(
                "{} bytes at level {:?}: {}",
                text.len(),
                opts.error_correction,
                err
            ))
        })?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let scale = opts.pixels_per_module;
    let side = (modules + 2 * opts.margin_modules) * scale;
    let offset = opts.margin_modules * scale;

    let mut image = GrayImage::from_pixel(side, side, LIGHT);
    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = index as u32 % modules;
        let my = index as u32 / modules;
        let x0 = offset + mx * scale;
        let y0 = offset + my * scale;
        for y in y0..y0 + scale {
            for x in x0..x0 + scale {
                image.put_pixel(x, y, DARK);
            }
        }
    }

    debug!(modules, side, "QR rasterized");
    Ok(MonochromeBitmap { image, modules })
}
