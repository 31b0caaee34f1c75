//! Horizontal vegetation profiler: per-height cover from a photo series
//! taken at increasing pole heights, aggregated into a vertical density
//! profile (digital Robel pole).

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::classify::{count_frame, ClassificationMethod};
use crate::errors::{Result, VegMetricsError};
use crate::measurement::{round2, round3, shannon_entropy, AggregateCounts};

/// Height (cm) at and beyond which the density weight bottoms out.
const DENSITY_REFERENCE_HEIGHT: f64 = 250.0;
/// Floor for the density weight numerator.
const DENSITY_WEIGHT_FLOOR: f64 = 0.1;

/// Mean-cover thresholds for the coarse profile label.
const SPARSE_COVER_MAX: f64 = 30.0;
const MODERATE_COVER_MAX: f64 = 70.0;

/// Coarse vertical-structure label derived from mean cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityLabel {
    Sparse,
    Moderate,
    Dense,
}

impl DensityLabel {
    pub fn from_average_cover(average_cover_pct: f64) -> Self {
        if average_cover_pct < SPARSE_COVER_MAX {
            Self::Sparse
        } else if average_cover_pct < MODERATE_COVER_MAX {
            Self::Moderate
        } else {
            Self::Dense
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sparse => "sparse",
            Self::Moderate => "moderate",
            Self::Dense => "dense",
        }
    }
}

/// A profiling request: one photo per measurement height, full-frame
/// classification (no zenith mask at ground level).
pub struct ProfileRequest<'a> {
    pub buffers: &'a [PixelBuffer],
    pub heights_cm: &'a [u32],
    pub method: ClassificationMethod,
    pub on_progress: Option<&'a (dyn Fn(u8, &str) + Send + Sync)>,
}

impl<'a> ProfileRequest<'a> {
    pub fn new(
        buffers: &'a [PixelBuffer],
        heights_cm: &'a [u32],
        method: ClassificationMethod,
    ) -> Self {
        Self {
            buffers,
            heights_cm,
            method,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: &'a (dyn Fn(u8, &str) + Send + Sync)) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// Coverage measured at one pole height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightReading {
    pub height_cm: u32,
    /// Green-pixel share of the full frame, 2 decimals.
    pub coverage_pct: f64,
    /// Coverage weighted inversely by height: low readings of dense
    /// vegetation indicate a dense understory.
    pub density_index: f64,
    pub counts: AggregateCounts,
}

/// The aggregated vertical profile across all sample heights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightProfile {
    pub method: ClassificationMethod,
    pub readings: Vec<HeightReading>,
    /// Height (cm) -> coverage %, ordered by height.
    pub cover_by_height: BTreeMap<u32, f64>,
    pub average_cover_pct: f64,
    /// Shannon entropy over per-height coverage proportions, 3 decimals.
    pub height_diversity: f64,
    pub profile: DensityLabel,
    pub elapsed_ms: u64,
}

/// Run the profiler over an ordered photo series.
///
/// Fails with `InputCardinalityMismatch` when image and height counts
/// differ, and with `DuplicateSampleHeight` when the same height appears
/// twice; silently overwriting a duplicate would make the cover-by-height
/// map depend on input order.
pub fn analyze_profile(request: &ProfileRequest) -> Result<HeightProfile> {
    if request.buffers.len() != request.heights_cm.len() {
        return Err(VegMetricsError::InputCardinalityMismatch {
            images: request.buffers.len(),
            heights: request.heights_cm.len(),
        });
    }
    if request.buffers.is_empty() {
        return Err(VegMetricsError::EmptyAnalysisRegion);
    }

    let started = Instant::now();
    let image_count = request.buffers.len();

    let mut readings = Vec::with_capacity(image_count);
    let mut cover_by_height = BTreeMap::new();

    for (index, (buffer, &height_cm)) in request
        .buffers
        .iter()
        .zip(request.heights_cm.iter())
        .enumerate()
    {
        if let Some(progress) = request.on_progress {
            let pct = (index as f64 / image_count as f64 * 100.0) as u8;
            progress(pct, "classifying height series");
        }

        let counts = count_frame(buffer, request.method)?;
        let coverage_pct = counts.positive_pct();

        let weight = (DENSITY_REFERENCE_HEIGHT - height_cm as f64).max(DENSITY_WEIGHT_FLOOR)
            / DENSITY_REFERENCE_HEIGHT;
        let density_index = round2(coverage_pct * weight);

        if cover_by_height.insert(height_cm, coverage_pct).is_some() {
            return Err(VegMetricsError::DuplicateSampleHeight(height_cm));
        }

        readings.push(HeightReading {
            height_cm,
            coverage_pct,
            density_index,
            counts,
        });
    }

    if let Some(progress) = request.on_progress {
        progress(100, "aggregating profile");
    }

    let coverages: Vec<f64> = readings.iter().map(|r| r.coverage_pct).collect();
    let average_cover_pct = round2(coverages.iter().sum::<f64>() / coverages.len() as f64);
    let height_diversity = round3(shannon_entropy(&coverages));

    Ok(HeightProfile {
        method: request.method,
        readings,
        cover_by_height,
        average_cover_pct,
        height_diversity,
        profile: DensityLabel::from_average_cover(average_cover_pct),
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Rgb;
    use crate::classify::DEFAULT_GREEN_THRESHOLD;
    use assert_approx_eq::assert_approx_eq;

    const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };

    fn method() -> ClassificationMethod {
        ClassificationMethod::ColorThreshold {
            threshold: DEFAULT_GREEN_THRESHOLD,
        }
    }

    /// A 10-pixel frame with the requested number of green pixels, so each
    /// green pixel is worth exactly 10% coverage.
    fn frame_with_cover(green_pixels: usize) -> PixelBuffer {
        let mut data = Vec::new();
        for i in 0..10 {
            let px = if i < green_pixels { GREEN } else { RED };
            data.extend_from_slice(&[px.r, px.g, px.b]);
        }
        PixelBuffer::new(5, 2, 3, data).unwrap()
    }

    #[test]
    fn aggregates_two_height_series() {
        let buffers = vec![frame_with_cover(8), frame_with_cover(2)];
        let heights = vec![50, 150];
        let request = ProfileRequest::new(&buffers, &heights, method());
        let profile = analyze_profile(&request).unwrap();

        assert_approx_eq!(profile.cover_by_height[&50], 80.0);
        assert_approx_eq!(profile.cover_by_height[&150], 20.0);
        assert_approx_eq!(profile.average_cover_pct, 50.0);
        assert_eq!(profile.profile, DensityLabel::Moderate);
        // -(0.8 ln 0.8 + 0.2 ln 0.2)
        assert_approx_eq!(profile.height_diversity, 0.500, 1e-9);
    }

    #[test]
    fn density_index_weights_low_heights_heavier() {
        let buffers = vec![frame_with_cover(5), frame_with_cover(5)];
        let heights = vec![50, 200];
        let request = ProfileRequest::new(&buffers, &heights, method());
        let profile = analyze_profile(&request).unwrap();

        // Same 50% coverage, but 50 cm weighs 200/250 and 200 cm 50/250.
        assert_approx_eq!(profile.readings[0].density_index, 40.0);
        assert_approx_eq!(profile.readings[1].density_index, 10.0);
    }

    #[test]
    fn density_weight_bottoms_out_at_reference_height() {
        let buffers = vec![frame_with_cover(10)];
        let heights = vec![250];
        let request = ProfileRequest::new(&buffers, &heights, method());
        let profile = analyze_profile(&request).unwrap();
        // weight floor 0.1 / 250
        assert_approx_eq!(profile.readings[0].density_index, 0.04);
    }

    #[test]
    fn mismatched_cardinality_fails() {
        let buffers = vec![frame_with_cover(5)];
        let heights = vec![50, 100];
        let err = analyze_profile(&ProfileRequest::new(&buffers, &heights, method())).unwrap_err();
        assert!(matches!(
            err,
            VegMetricsError::InputCardinalityMismatch {
                images: 1,
                heights: 2
            }
        ));
    }

    #[test]
    fn duplicate_heights_are_rejected() {
        let buffers = vec![frame_with_cover(5), frame_with_cover(6)];
        let heights = vec![100, 100];
        let err = analyze_profile(&ProfileRequest::new(&buffers, &heights, method())).unwrap_err();
        assert!(matches!(err, VegMetricsError::DuplicateSampleHeight(100)));
    }

    #[test]
    fn empty_series_is_rejected() {
        let err =
            analyze_profile(&ProfileRequest::new(&[], &[], method())).unwrap_err();
        assert!(matches!(err, VegMetricsError::EmptyAnalysisRegion));
    }

    #[test]
    fn zero_coverage_series_has_zero_diversity() {
        let buffers = vec![frame_with_cover(0), frame_with_cover(0)];
        let heights = vec![50, 150];
        let profile = analyze_profile(&ProfileRequest::new(&buffers, &heights, method())).unwrap();

        assert_approx_eq!(profile.average_cover_pct, 0.0);
        assert_approx_eq!(profile.height_diversity, 0.0);
        assert_eq!(profile.profile, DensityLabel::Sparse);
    }

    #[test]
    fn dense_label_above_seventy_percent() {
        let buffers = vec![frame_with_cover(8), frame_with_cover(9)];
        let heights = vec![50, 100];
        let profile = analyze_profile(&ProfileRequest::new(&buffers, &heights, method())).unwrap();
        assert_eq!(profile.profile, DensityLabel::Dense);
    }
}
