// Per-pixel classification rules. Every analyzer funnels through this module
// so the membership rules live in exactly one place.

use serde::{Deserialize, Serialize};

use crate::buffer::{PixelBuffer, Rgb};
use crate::errors::{Result, VegMetricsError};
use crate::measurement::AggregateCounts;

/// Dark-canopy brightness cutoff for the brightness/greenness rule.
const CANOPY_BRIGHTNESS_MAX: f64 = 80.0;
/// Greenness cutoff for the brightness/greenness rule.
const CANOPY_GREENNESS_MIN: f64 = 0.4;

/// Channel-ratio ceiling for the Canopeo-style rule.
const RATIO_MAX: f64 = 0.95;
/// Excess-green floor (2g - r - b) for the Canopeo-style rule.
const EXCESS_GREEN_MIN: f64 = 20.0;

/// Sobel gradient magnitude above which a pixel is edge-like.
const EDGE_MAGNITUDE_MIN: f64 = 50.0;
/// Green channel floor for counting an edge pixel as vegetation.
const EDGE_GREEN_MIN: u8 = 100;

/// Hue band (degrees) accepted by the heuristic cluster rule.
const CLUSTER_HUE_MIN: f64 = 60.0;
const CLUSTER_HUE_MAX: f64 = 180.0;
/// Saturation floor for the heuristic cluster rule.
const CLUSTER_SATURATION_MIN: f64 = 0.3;
/// Value floor (0-255 scale) for the heuristic cluster rule.
const CLUSTER_VALUE_MIN: f64 = 50.0;

/// Default green-ratio threshold for [`ClassificationMethod::ColorThreshold`].
pub const DEFAULT_GREEN_THRESHOLD: f64 = 0.3;
/// Default cutoff for [`ClassificationMethod::BrightnessThreshold`].
pub const DEFAULT_BRIGHTNESS_THRESHOLD: f64 = 128.0;

/// Closed set of pixel classification rules. Selected once per analysis
/// request; dispatch is an exhaustive match, never a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// Canopy default: dark silhouettes or saturated green foliage.
    BrightnessGreenness,
    /// Canopeo-style channel-ratio rule; rejects near-gray sky pixels.
    ColorRatio,
    /// Generic green-count with a caller-supplied green-ratio threshold.
    ColorThreshold { threshold: f64 },
    /// Sobel edge magnitude gated by the green channel. Batch-only: the
    /// rule needs a 3x3 neighborhood and skips the 1-pixel border.
    EdgeDetection,
    /// HSV band heuristic. This is a fixed stand-in for a trained model,
    /// not machine learning; it exists so a real classifier can slot in
    /// behind the same variant later.
    HeuristicCluster,
    /// Plain darkness cutoff on mean brightness.
    BrightnessThreshold { threshold: f64 },
}

impl ClassificationMethod {
    /// Short stable name for logs and output records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BrightnessGreenness => "brightness_greenness",
            Self::ColorRatio => "color_ratio",
            Self::ColorThreshold { .. } => "color_threshold",
            Self::EdgeDetection => "edge_detection",
            Self::HeuristicCluster => "heuristic_cluster",
            Self::BrightnessThreshold { .. } => "brightness_threshold",
        }
    }

    /// True for methods that need neighborhood context and therefore only
    /// run through [`count_frame`], never per pixel.
    pub fn requires_neighborhood(&self) -> bool {
        matches!(self, Self::EdgeDetection)
    }

    /// Pointwise membership test.
    ///
    /// [`ClassificationMethod::EdgeDetection`] carries no pointwise rule
    /// and always returns `false` here; analyzers that accept it must go
    /// through [`count_frame`]. Analyzers that do not accept it reject the
    /// method up front with `UnsupportedMethod`.
    #[inline]
    pub fn classify(&self, px: Rgb) -> bool {
        match self {
            Self::BrightnessGreenness => {
                px.brightness() < CANOPY_BRIGHTNESS_MAX || px.greenness() > CANOPY_GREENNESS_MIN
            }
            Self::ColorRatio => {
                let (r, g, b) = (px.r as f64, px.g as f64, px.b as f64);
                // Ratios are defined as 0 when the green channel is 0.
                let (rg, bg) = if px.g == 0 { (0.0, 0.0) } else { (r / g, b / g) };
                rg < RATIO_MAX && bg < RATIO_MAX && (2.0 * g - r - b) > EXCESS_GREEN_MIN
            }
            Self::ColorThreshold { threshold } => {
                let (r, g, b) = (px.r as i32, px.g as i32, px.b as i32);
                px.greenness() > *threshold
                    && g > r
                    && g > b
                    && (g - r) > 30
                    && (g - b) > 20
            }
            Self::EdgeDetection => false,
            Self::HeuristicCluster => {
                let (hue, saturation, value) = rgb_to_hsv(px);
                (CLUSTER_HUE_MIN..=CLUSTER_HUE_MAX).contains(&hue)
                    && saturation > CLUSTER_SATURATION_MIN
                    && value > CLUSTER_VALUE_MIN
            }
            Self::BrightnessThreshold { threshold } => px.brightness() < *threshold,
        }
    }
}

/// Convert a pixel to (hue, saturation, value): hue in [0, 360), saturation
/// in [0, 1], value on the 0-255 scale.
pub fn rgb_to_hsv(px: Rgb) -> (f64, f64, f64) {
    let r = px.r as f64;
    let g = px.g as f64;
    let b = px.b as f64;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue, saturation, max)
}

/// Classify every pixel of a full frame under `method` and return the
/// aggregate counts.
///
/// For pointwise methods every pixel is considered; for edge detection only
/// interior pixels are, and the total reflects that. Scan order does not
/// affect the counts.
pub fn count_frame(buffer: &PixelBuffer, method: ClassificationMethod) -> Result<AggregateCounts> {
    if method.requires_neighborhood() {
        return count_edges(buffer);
    }

    let mut positive = 0u64;
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            if method.classify(buffer.get(x, y)) {
                positive += 1;
            }
        }
    }

    let total = buffer.pixel_count();
    Ok(AggregateCounts {
        total,
        positive,
        negative: total - positive,
    })
}

/// Sobel-based vegetation edge counting over interior pixels.
///
/// Grayscale conversion uses Rec. 601 luma; a pixel counts as a vegetation
/// edge iff its gradient magnitude exceeds 50 and its green channel exceeds
/// 100. Images narrower than 3 pixels in either dimension have no interior
/// and fail with `EmptyAnalysisRegion`.
fn count_edges(buffer: &PixelBuffer) -> Result<AggregateCounts> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;

    if width < 3 || height < 3 {
        return Err(VegMetricsError::EmptyAnalysisRegion);
    }

    // Single grayscale pass so the convolution below is a flat lookup.
    let mut gray = Vec::with_capacity(width * height);
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            gray.push(buffer.get(x, y).grayscale());
        }
    }

    const SOBEL_X: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
    const SOBEL_Y: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

    let mut positive = 0u64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut gx = 0.0;
            let mut gy = 0.0;
            for (ky, (kx_row, ky_row)) in SOBEL_X.iter().zip(SOBEL_Y.iter()).enumerate() {
                for kx in 0..3 {
                    let sample = gray[(y + ky - 1) * width + (x + kx - 1)];
                    gx += sample * kx_row[kx];
                    gy += sample * ky_row[kx];
                }
            }

            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude > EDGE_MAGNITUDE_MIN && buffer.get(x as u32, y as u32).g > EDGE_GREEN_MIN {
                positive += 1;
            }
        }
    }

    let total = (width as u64 - 2) * (height as u64 - 2);
    Ok(AggregateCounts {
        total,
        positive,
        negative: total - positive,
    })
}
