//! Raster samples returned by the imagery upstream.
//!
//! A [`RasterSample`] is a row-major grid of per-pixel index values in
//! [-1, 1]. Pixels excluded by the upstream cloud mask (or outside sensor
//! coverage) are `NaN` and are ignored by all statistics.

use thiserror::Error;

/// Errors constructing a raster sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    /// Pixel buffer length does not match the stated dimensions
    #[error("pixel buffer holds {actual} values, expected {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },

    /// Zero-sized rasters carry no information
    #[error("raster dimensions must be non-zero")]
    EmptyDimensions,
}

/// Row-major grid of per-pixel f32 index values; `NaN` marks no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSample {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

impl RasterSample {
    /// Creates a raster from a row-major pixel buffer.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<f32>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyDimensions);
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RasterError::DimensionMismatch {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Creates a raster with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel values.
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Spatial mean over valid pixels, ignoring no-data.
    ///
    /// Returns `None` when every pixel is no-data; the mean is undefined in
    /// that case and callers must not substitute a number for it.
    pub fn mean(&self) -> Option<f64> {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &value in &self.pixels {
            if !value.is_nan() {
                sum += f64::from(value);
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}
