//! Index engine: pure statistics and preview encoding over raster samples.
//!
//! Everything here is deterministic and free of I/O. The rounding rules and
//! the change-percentage formula are a public contract: clients receive the
//! values verbatim, and cached results are compared bit-for-bit in tests.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{GrayImage, ImageOutputFormat};
use thiserror::Error;

use crate::raster::RasterSample;

/// Decimal places kept on index means.
pub const MEAN_DECIMALS: i32 = 4;

/// Decimal places kept on the change percentage.
pub const PERCENT_DECIMALS: i32 = 2;

/// Denominator guard for the change-percentage rule. A "before" mean with
/// magnitude at or below this yields a change of exactly 0 instead of a
/// blown-up ratio.
pub const CHANGE_EPSILON: f64 = 1e-6;

/// Display value written into no-data pixels before scaling.
const NO_DATA_SENTINEL: f32 = -1.0;

/// Errors from the comparison statistics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Every pixel of a required scene was no-data; the mean is undefined
    /// and no number may be fabricated for it
    #[error("no usable pixels in the requested scenes, likely due to cloud cover")]
    NoDataAvailable,
}

/// Errors from preview encoding.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Raster dimensions did not form a valid image buffer
    #[error("raster dimensions do not form a valid image buffer")]
    BufferMismatch,

    /// PNG encoder failure
    #[error("preview encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Rounded comparison of two index means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexComparison {
    /// Mean of the "before" scene, rounded to [`MEAN_DECIMALS`]
    pub from_value: f64,
    /// Mean of the "after" scene, rounded to [`MEAN_DECIMALS`]
    pub to_value: f64,
    /// Relative change, rounded to [`PERCENT_DECIMALS`]
    pub change_percentage: f64,
}

/// Rounds `value` to `decimals` decimal places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Compares the spatial means of two raster samples.
///
/// The change percentage is `(to - from) / |from| * 100` when `|from|`
/// exceeds [`CHANGE_EPSILON`], else exactly 0. The absolute-value
/// denominator keeps the sign of the change meaningful for negative index
/// means; it also makes the rule non-symmetric under swapping the scenes,
/// which callers rely on. The change is computed from the unrounded means
/// and rounded last.
///
/// Fails with [`EngineError::NoDataAvailable`] when either mean is
/// undefined (every pixel no-data).
pub fn compare_means(
    from: &RasterSample,
    to: &RasterSample,
) -> Result<IndexComparison, EngineError> {
    let (Some(mean_from), Some(mean_to)) = (from.mean(), to.mean()) else {
        return Err(EngineError::NoDataAvailable);
    };

    let change = if mean_from.abs() > CHANGE_EPSILON {
        (mean_to - mean_from) / mean_from.abs() * 100.0
    } else {
        0.0
    };

    Ok(IndexComparison {
        from_value: round_to(mean_from, MEAN_DECIMALS),
        to_value: round_to(mean_to, MEAN_DECIMALS),
        change_percentage: round_to(change, PERCENT_DECIMALS),
    })
}

/// Encodes a raster as a grayscale PNG heatmap data URL.
///
/// No-data pixels are mapped to the darkest displayable value: the sentinel
/// -1.0 is written in their place before scaling, so they render as 0
/// rather than being skipped. All values are clamped to [-1, 1] and scaled
/// with `clip(v) * 127.5 + 127.5`. The input raster is read-only; encoding
/// never mutates the caller's buffer.
pub fn encode_preview(raster: &RasterSample) -> Result<String, PreviewError> {
    let scaled: Vec<u8> = raster
        .pixels()
        .iter()
        .map(|&value| {
            let value = if value.is_nan() {
                NO_DATA_SENTINEL
            } else {
                value
            };
            (value.clamp(-1.0, 1.0) * 127.5 + 127.5) as u8
        })
        .collect();

    let image = GrayImage::from_raw(raster.width(), raster.height(), scaled)
        .ok_or(PreviewError::BufferMismatch)?;

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;

    Ok(format!("data:image/png;base64,{}", BASE64.encode(&png)))
}

/// Wraps upstream JPEG bytes in a data URL for the comparative-imagery mode.
pub fn encode_jpeg_preview(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}
