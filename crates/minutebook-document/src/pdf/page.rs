// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certification page — the single page appended to a certified document.
//
// Drawn directly as a lopdf content stream with the standard Helvetica
// fonts and one 1-bit image XObject for the QR code. The page carries the
// entity/lane/class/operator/timestamp rows but never the digest or the
// verification URL as text: the QR code is the only channel for the link.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use minutebook_core::error::MinutebookError;
use minutebook_core::types::CertificationMetadata;
use tracing::debug;

use crate::qr::MonochromeBitmap;

/// US Letter, in points.
pub const PAGE_WIDTH_PT: f32 = 612.0;
pub const PAGE_HEIGHT_PT: f32 = 792.0;

const MARGIN_PT: f32 = 54.0;
const BAND_HEIGHT_PT: f32 = 88.0;
const VALUE_COLUMN_PT: f32 = 190.0;
const VALUE_FONT_PT: f32 = 11.0;
const LABEL_FONT_PT: f32 = 9.5;
const LINE_HEIGHT_PT: f32 = 15.0;
const ROW_GAP_PT: f32 = 9.0;
const QR_SIZE_PT: f32 = 180.0;
const QR_BOTTOM_PT: f32 = 150.0;

/// Longest value line before wrapping, in characters.
const VALUE_WRAP_CHARS: usize = 58;
/// Values longer than this many lines are cut with an ellipsis.
const VALUE_MAX_LINES: usize = 3;

const TITLE: &str = "CERTIFICATE OF RECORD";
const SUBTITLE: &str = "Minute book entry certified as a true and unaltered copy";
const CAPTION: &str = "Scan the code to verify this document against the certification registry.";
const SANDBOX_NOTICE: &str = "SANDBOX - NOT VALID FOR OFFICIAL USE";

/// Resource names inside the page's resource dictionary.
const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";
const QR_XOBJECT: &str = "QR";

/// Renders the certification page into an output document.
pub struct CertificationPage<'a> {
    metadata: &'a CertificationMetadata,
    qr: &'a MonochromeBitmap,
}

impl<'a> CertificationPage<'a> {
    pub fn new(metadata: &'a CertificationMetadata, qr: &'a MonochromeBitmap) -> Self {
        Self { metadata, qr }
    }

    /// Label/value rows in print order.
    fn rows(&self) -> [(&'static str, String); 5] {
        [
            ("ENTITY", self.metadata.entity_label.clone()),
            ("LANE", self.metadata.lane.label().to_string()),
            ("DOCUMENT CLASS", self.metadata.document_class.clone()),
            ("CERTIFIED BY", self.metadata.operator.clone()),
            ("CERTIFIED AT", self.metadata.certified_at_label()),
        ]
    }

    /// Add the page (and its fonts, image, content stream) to `doc` as a
    /// child of `parent_id`. Returns the page's object id.
    pub fn add_to(&self, doc: &mut Document, parent_id: ObjectId) -> Result<ObjectId, MinutebookError> {
        let regular_id = doc.add_object(standard_font("Helvetica"));
        let bold_id = doc.add_object(standard_font("Helvetica-Bold"));
        let qr_id = doc.add_object(self.qr_image());

        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => regular_id,
                FONT_BOLD => bold_id,
            },
            "XObject" => dictionary! {
                QR_XOBJECT => qr_id,
            },
        });

        let content = self.content().encode().map_err(|err| {
            MinutebookError::PdfError(format!("failed to encode certification page: {}", err))
        })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => parent_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH_PT.into(), PAGE_HEIGHT_PT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });

        debug!(?page_id, qr_px = self.qr.width(), "certification page added");
        Ok(page_id)
    }

    fn qr_image(&self) -> Stream {
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(self.qr.width()),
                "Height" => i64::from(self.qr.height()),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1_i64,
                "Interpolate" => false,
            },
            self.qr.to_packed_bits(),
        );
        // Keep the samples exactly as rasterized.
        stream.allows_compression = false;
        stream
    }

    fn content(&self) -> Content {
        let mut ops = Vec::new();

        // Title band.
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("rg", vec![0.11_f32.into(), 0.16_f32.into(), 0.27_f32.into()]));
        ops.push(Operation::new(
            "re",
            vec![
                0.into(),
                (PAGE_HEIGHT_PT - BAND_HEIGHT_PT).into(),
                PAGE_WIDTH_PT.into(),
                BAND_HEIGHT_PT.into(),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));

        push_text(&mut ops, FONT_BOLD, 20.0, MARGIN_PT, PAGE_HEIGHT_PT - 44.0, (1.0, 1.0, 1.0), TITLE);
        push_text(&mut ops, FONT_REGULAR, 10.0, MARGIN_PT, PAGE_HEIGHT_PT - 64.0, (0.85, 0.88, 0.93), SUBTITLE);

        let mut y = PAGE_HEIGHT_PT - BAND_HEIGHT_PT - 40.0;
        if self.metadata.lane.is_sandbox() {
            push_text(&mut ops, FONT_BOLD, 12.0, MARGIN_PT, y, (0.75, 0.1, 0.1), SANDBOX_NOTICE);
            y -= LINE_HEIGHT_PT + ROW_GAP_PT;
        }

        // Label/value rows.
        for (label, value) in self.rows() {
            push_text(&mut ops, FONT_BOLD, LABEL_FONT_PT, MARGIN_PT, y, (0.4, 0.4, 0.45), label);
            for line in value_lines(&value) {
                push_text(&mut ops, FONT_REGULAR, VALUE_FONT_PT, VALUE_COLUMN_PT, y, (0.0, 0.0, 0.0), &line);
                y -= LINE_HEIGHT_PT;
            }
            y -= ROW_GAP_PT;
        }

        // Rule above the code.
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("RG", vec![0.8_f32.into(), 0.8_f32.into(), 0.8_f32.into()]));
        ops.push(Operation::new("w", vec![0.75_f32.into()]));
        let rule_y = QR_BOTTOM_PT + QR_SIZE_PT + 30.0;
        ops.push(Operation::new("m", vec![MARGIN_PT.into(), rule_y.into()]));
        ops.push(Operation::new("l", vec![(PAGE_WIDTH_PT - MARGIN_PT).into(), rule_y.into()]));
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));

        // QR code, centred.
        let qr_x = (PAGE_WIDTH_PT - QR_SIZE_PT) / 2.0;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                QR_SIZE_PT.into(),
                0.into(),
                0.into(),
                QR_SIZE_PT.into(),
                qr_x.into(),
                QR_BOTTOM_PT.into(),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(QR_XOBJECT.as_bytes().to_vec())]));
        ops.push(Operation::new("Q", vec![]));

        let caption_x = centred_x(CAPTION, 9.0);
        push_text(&mut ops, FONT_REGULAR, 9.0, caption_x, QR_BOTTOM_PT - 22.0, (0.3, 0.3, 0.3), CAPTION);

        Content { operations: ops }
    }
}

fn standard_font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Emit one line of text at an absolute position.
fn push_text(
    ops: &mut Vec<Operation>,
    font: &str,
    size: f32,
    x: f32,
    y: f32,
    (r, g, b): (f32, f32, f32),
    text: &str,
) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    ops.push(Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(printable(text))]));
    ops.push(Operation::new("ET", vec![]));
}

/// Approximate left edge that centres `text` on the page.
fn centred_x(text: &str, size: f32) -> f32 {
    // Average Helvetica glyph width is roughly half the font size.
    let width = text.chars().count() as f32 * size * 0.5;
    ((PAGE_WIDTH_PT - width) / 2.0).max(MARGIN_PT)
}

/// Reduce text to printable ASCII, the safe subset of WinAnsiEncoding for
/// the standard fonts.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

/// Wrap a value and cap it at `VALUE_MAX_LINES` lines.
fn value_lines(value: &str) -> Vec<String> {
    let value = if value.trim().is_empty() { "-" } else { value.trim() };
    let mut lines = wrap_text(&printable(value), VALUE_WRAP_CHARS);
    if lines.len() > VALUE_MAX_LINES {
        lines.truncate(VALUE_MAX_LINES);
        if let Some(last) = lines.last_mut() {
            last.truncate(VALUE_WRAP_CHARS.saturating_sub(3));
            last.push_str("...");
        }
    }
    lines
}

/// Word-wrap `text` so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first. Words longer than `max_width` are
/// force-broken. Input must be ASCII (see [`printable`]).
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        let mut current_line = String::with_capacity(max_width);
        for word in words {
            if word.len() > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let mut remaining = word;
                while remaining.len() > max_width {
                    let (chunk, rest) = remaining.split_at(max_width);
                    result.push(chunk.to_string());
                    remaining = rest;
                }
                current_line.push_str(remaining);
            } else if current_line.is_empty() {
                current_line.push_str(word);
            } else if current_line.len() + 1 + word.len() <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    if result.is_empty() {
        result.push("-".to_string());
    }
    result
}
