//! Segment planning: decide which vertical slices of a page photo are sent
//! to the model, and encode each slice as a base64 image payload.
//!
//! A dense page photographed at phone resolution is sometimes too much for
//! one request; the model skips lines or truncates. Fragment mode splits the
//! page into a top slice (0–60 %) and a bottom slice (40–100 %). The 20 %
//! overlap keeps a line cut in half by one slice whole in the other.
//!
//! Whole-page payloads are the original file bytes; fragments are decoded,
//! cropped and re-encoded as JPEG.

use crate::config::ProcessMode;
use crate::error::Hw2TexError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Which slice of the page a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Whole,
    Top,
    Bottom,
}

impl SegmentKind {
    /// `(start, end)` as fractions of page height.
    pub fn fractions(self) -> (f64, f64) {
        match self {
            SegmentKind::Whole => (0.0, 1.0),
            SegmentKind::Top => (0.0, 0.6),
            SegmentKind::Bottom => (0.4, 1.0),
        }
    }

    /// Short label used in artifact names and log lines.
    pub fn label(self) -> &'static str {
        match self {
            SegmentKind::Whole => "page",
            SegmentKind::Top => "top",
            SegmentKind::Bottom => "bottom",
        }
    }

    /// Pixel rows `[start, end)` of this slice for an image `height` rows tall.
    ///
    /// Always returns at least one row for a non-empty image.
    pub fn row_range(self, height: u32) -> (u32, u32) {
        let (start, end) = self.fractions();
        let h = f64::from(height);
        let y0 = ((h * start).round() as u32).min(height.saturating_sub(1));
        let y1 = ((h * end).round() as u32).clamp(y0 + 1, height.max(1));
        (y0, y1)
    }
}

/// The slices requested for a page in the given mode, in submission order.
pub fn plan_segments(mode: ProcessMode) -> Vec<SegmentKind> {
    match mode {
        ProcessMode::Whole => vec![SegmentKind::Whole],
        ProcessMode::Fragment => vec![SegmentKind::Top, SegmentKind::Bottom],
    }
}

/// A base64-encoded image ready for a multimodal request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    /// `data:` URL form accepted by chat-completions `image_url` parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One slice of a page, encoded.
#[derive(Debug, Clone)]
pub struct Segment {
    pub kind: SegmentKind,
    pub image: ImagePayload,
}

/// Read the page photo once and produce the payloads for `mode`.
pub fn load_segments(path: &Path, mode: ProcessMode) -> Result<Vec<Segment>, Hw2TexError> {
    let bytes = std::fs::read(path).map_err(|e| Hw2TexError::ImageReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    match mode {
        ProcessMode::Whole => Ok(vec![Segment {
            kind: SegmentKind::Whole,
            image: encode_bytes(&bytes, mime_for(path)),
        }]),
        ProcessMode::Fragment => {
            let img = image::load_from_memory(&bytes).map_err(|e| Hw2TexError::ImageDecodeFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            plan_segments(mode)
                .into_iter()
                .map(|kind| {
                    let image = encode_jpeg(&crop(&img, kind)).map_err(|e| {
                        Hw2TexError::ImageDecodeFailed {
                            path: path.to_path_buf(),
                            detail: format!("re-encoding {} fragment: {}", kind.label(), e),
                        }
                    })?;
                    Ok(Segment { kind, image })
                })
                .collect()
        }
    }
}

/// Crop the vertical slice `kind` out of `img`, keeping the full width.
pub fn crop(img: &DynamicImage, kind: SegmentKind) -> DynamicImage {
    let (y0, y1) = kind.row_range(img.height());
    img.crop_imm(0, y0, img.width(), y1 - y0)
}

fn encode_bytes(bytes: &[u8], mime_type: &str) -> ImagePayload {
    let data = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", data.len());
    ImagePayload {
        mime_type: mime_type.to_string(),
        data,
    }
}

/// JPEG has no alpha channel, so the crop is flattened to RGB first.
fn encode_jpeg(img: &DynamicImage) -> Result<ImagePayload, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;
    Ok(encode_bytes(&buf, "image/jpeg"))
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}
