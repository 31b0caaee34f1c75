use image::RgbaImage;

use crate::errors::{Result, VegMetricsError};

/// One RGB pixel sample, 8-bit per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Mean of the three channels, in [0, 255].
    #[inline]
    pub fn brightness(&self) -> f64 {
        (self.r as f64 + self.g as f64 + self.b as f64) / 3.0
    }

    /// Green share of the channel sum; the sum is clamped to at least 1
    /// so an all-black pixel yields 0 rather than NaN.
    #[inline]
    pub fn greenness(&self) -> f64 {
        let sum = (self.r as f64 + self.g as f64 + self.b as f64).max(1.0);
        self.g as f64 / sum
    }

    /// Luma via the Rec. 601 weights (0.299 R + 0.587 G + 0.114 B).
    #[inline]
    pub fn grayscale(&self) -> f64 {
        0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64
    }
}

/// An immutable interleaved raster (R,G,B[,A], 8-bit each).
///
/// Analyzers borrow a buffer for the duration of one call and never mutate
/// or retain it. The alpha channel, when present, is carried but ignored by
/// classification.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer from raw interleaved bytes, validating that the data
    /// length matches `width * height * channels` and that no dimension is
    /// zero.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if !(3..=4).contains(&channels) {
            return Err(VegMetricsError::InvalidParameter(format!(
                "unsupported channel count: {} (expected 3 or 4)",
                channels
            )));
        }

        let expected = width as usize * height as usize * channels as usize;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(VegMetricsError::InvalidImageData {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Copy a decoded RGBA image into a buffer.
    pub fn from_rgba(image: &RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, 4, image.as_raw().clone())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Total pixel count.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Fetch the RGB sample at (x, y). Coordinates must be in bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgb {
        debug_assert!(x < self.width && y < self.height);
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        Rgb {
            r: self.data[idx],
            g: self.data[idx + 1],
            b: self.data[idx + 2],
        }
    }

    /// Build a uniformly colored buffer, mostly useful in tests.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&[color.r, color.g, color.b]);
        }
        Self::new(width, height, 3, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn rejects_mismatched_data_length() {
        let err = PixelBuffer::new(2, 2, 3, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            VegMetricsError::InvalidImageData {
                expected: 12,
                actual: 11,
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let err = PixelBuffer::new(0, 4, 3, vec![]).unwrap_err();
        assert!(matches!(err, VegMetricsError::InvalidImageData { .. }));
    }

    #[test]
    fn rejects_unsupported_channel_count() {
        let err = PixelBuffer::new(1, 1, 2, vec![0, 0]).unwrap_err();
        assert!(matches!(err, VegMetricsError::InvalidParameter(_)));
    }

    #[test]
    fn indexes_interleaved_pixels() {
        let data = vec![
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ];
        let buffer = PixelBuffer::new(2, 2, 3, data).unwrap();
        assert_eq!(buffer.get(0, 0), Rgb::new(1, 2, 3));
        assert_eq!(buffer.get(1, 0), Rgb::new(4, 5, 6));
        assert_eq!(buffer.get(0, 1), Rgb::new(7, 8, 9));
        assert_eq!(buffer.get(1, 1), Rgb::new(10, 11, 12));
    }

    #[test]
    fn greenness_of_black_pixel_is_zero() {
        assert_approx_eq!(Rgb::new(0, 0, 0).greenness(), 0.0);
    }

    #[test]
    fn brightness_is_channel_mean() {
        assert_approx_eq!(Rgb::new(30, 60, 90).brightness(), 60.0);
    }
}
