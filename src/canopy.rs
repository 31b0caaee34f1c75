//! Canopy frame analyzer: hemispherical-photo cover, light transmission and
//! leaf-area index under a zenith-cone mask.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::classify::ClassificationMethod;
use crate::errors::{Result, VegMetricsError};
use crate::measurement::{round2, round3, AggregateCounts};

/// Rows between progress checkpoints.
const PROGRESS_ROW_INTERVAL: u32 = 50;

/// One canopy analysis request. Constructed by the caller, consumed once.
pub struct CanopyRequest<'a> {
    pub buffer: &'a PixelBuffer,
    pub method: ClassificationMethod,
    /// Zenith cone half-angle in degrees, within [0, 90]. 90 considers the
    /// full inscribed circle, 0 only the exact frame center.
    pub zenith_angle_deg: f64,
    /// Advisory progress callback (percentage, stage label); may run on any
    /// worker thread.
    pub on_progress: Option<&'a (dyn Fn(u8, &str) + Send + Sync)>,
}

impl<'a> CanopyRequest<'a> {
    pub fn new(buffer: &'a PixelBuffer, method: ClassificationMethod) -> Self {
        Self {
            buffer,
            method,
            zenith_angle_deg: 90.0,
            on_progress: None,
        }
    }

    pub fn with_zenith_angle(mut self, degrees: f64) -> Self {
        self.zenith_angle_deg = degrees;
        self
    }

    pub fn with_progress(mut self, on_progress: &'a (dyn Fn(u8, &str) + Send + Sync)) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// Derived canopy metrics for a single frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanopyMeasurement {
    pub method: ClassificationMethod,
    /// Percentage of considered pixels classified as canopy, 2 decimals.
    pub canopy_cover_pct: f64,
    /// Complement of cover: visible sky percentage, 2 decimals.
    pub light_transmission_pct: f64,
    /// Beer's-law LAI `-ln(transmission / 100)`, 3 decimals. `None` for a
    /// fully occluded frame, where the logarithm is undefined.
    pub leaf_area_index: Option<f64>,
    pub counts: AggregateCounts,
    pub zenith_angle_deg: f64,
    pub elapsed_ms: u64,
}

/// Methods the canopy analyzer accepts. Edge and cluster rules target
/// ground-level vegetation, not sky/canopy separation.
fn validate_method(method: ClassificationMethod) -> Result<()> {
    match method {
        ClassificationMethod::BrightnessGreenness
        | ClassificationMethod::ColorRatio
        | ClassificationMethod::BrightnessThreshold { .. } => Ok(()),
        other => Err(VegMetricsError::UnsupportedMethod {
            method: other.name(),
            analyzer: "canopy",
        }),
    }
}

/// Analyze one upward frame.
///
/// Only pixels inside the zenith cone are considered: with frame center
/// `(w/2, h/2)` and inscribed radius `min(w, h)/2`, a pixel counts when its
/// distance from center is at most `radius * sin(zenith)`. A mask that
/// leaves zero pixels fails with `EmptyAnalysisRegion` instead of producing
/// a fabricated percentage.
pub fn analyze_canopy(request: &CanopyRequest) -> Result<CanopyMeasurement> {
    validate_method(request.method)?;

    let zenith = request.zenith_angle_deg;
    if !(0.0..=90.0).contains(&zenith) {
        return Err(VegMetricsError::InvalidParameter(format!(
            "zenith angle must be within [0, 90] degrees, got {}",
            zenith
        )));
    }

    let started = Instant::now();
    let buffer = request.buffer;
    let (width, height) = (buffer.width(), buffer.height());

    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = width.min(height) as f64 / 2.0;
    let effective_radius = radius * (zenith * std::f64::consts::PI / 180.0).sin();
    let radius_sq = effective_radius * effective_radius;

    let mut total = 0u64;
    let mut canopy = 0u64;

    for y in 0..height {
        if y % PROGRESS_ROW_INTERVAL == 0 {
            if let Some(progress) = request.on_progress {
                let pct = (y as f64 / height as f64 * 100.0) as u8;
                progress(pct, "scanning zenith cone");
            }
        }

        for x in 0..width {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy > radius_sq {
                continue;
            }

            total += 1;
            if request.method.classify(buffer.get(x, y)) {
                canopy += 1;
            }
        }
    }

    if total == 0 {
        return Err(VegMetricsError::EmptyAnalysisRegion);
    }

    if let Some(progress) = request.on_progress {
        progress(100, "deriving metrics");
    }

    let sky = total - canopy;
    let canopy_cover_pct = round2(canopy as f64 / total as f64 * 100.0);
    let light_transmission_pct = round2(sky as f64 / total as f64 * 100.0);

    // LAI from the unrounded transmission ratio. Cover of exactly 0 means a
    // bare-sky frame, defined as LAI 0; transmission of exactly 0 means the
    // logarithm is undefined and the index is not computable.
    let leaf_area_index = if canopy == 0 {
        Some(0.0)
    } else if sky == 0 {
        None
    } else {
        Some(round3(-(sky as f64 / total as f64).ln()))
    };

    Ok(CanopyMeasurement {
        method: request.method,
        canopy_cover_pct,
        light_transmission_pct,
        leaf_area_index,
        counts: AggregateCounts {
            total,
            positive: canopy,
            negative: sky,
        },
        zenith_angle_deg: zenith,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Rgb;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    fn considered_pixels(size: u32, zenith: f64) -> u64 {
        let buffer = PixelBuffer::filled(size, size, GREEN).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness)
            .with_zenith_angle(zenith);
        analyze_canopy(&request).unwrap().counts.total
    }

    #[test]
    fn full_green_frame_is_full_cover() {
        let buffer = PixelBuffer::filled(4, 4, GREEN).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness);
        let result = analyze_canopy(&request).unwrap();

        assert_approx_eq!(result.canopy_cover_pct, 100.0);
        assert_approx_eq!(result.light_transmission_pct, 0.0);
        assert_eq!(result.leaf_area_index, None);
        assert_eq!(result.counts.positive, result.counts.total);
    }

    #[test]
    fn all_white_frame_is_open_sky() {
        let buffer = PixelBuffer::filled(4, 4, WHITE).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness);
        let result = analyze_canopy(&request).unwrap();

        assert_approx_eq!(result.canopy_cover_pct, 0.0);
        assert_approx_eq!(result.light_transmission_pct, 100.0);
        assert_eq!(result.leaf_area_index, Some(0.0));
    }

    #[test]
    fn cover_and_transmission_sum_to_hundred() {
        // Left half dark, right half white, so both classes are populated.
        let mut data = Vec::new();
        for _y in 0..8 {
            for x in 0..8u32 {
                if x < 4 {
                    data.extend_from_slice(&[10, 20, 10]);
                } else {
                    data.extend_from_slice(&[255, 255, 255]);
                }
            }
        }
        let buffer = PixelBuffer::new(8, 8, 3, data).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness);
        let result = analyze_canopy(&request).unwrap();

        assert!(result.canopy_cover_pct > 0.0 && result.canopy_cover_pct < 100.0);
        assert_approx_eq!(
            result.canopy_cover_pct + result.light_transmission_pct,
            100.0,
            0.011
        );
        assert!(result.leaf_area_index.unwrap() > 0.0);
    }

    #[test]
    fn zero_zenith_on_single_pixel_is_empty_region() {
        let buffer = PixelBuffer::filled(1, 1, Rgb::new(0, 0, 0)).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness)
            .with_zenith_angle(0.0);
        let err = analyze_canopy(&request).unwrap_err();
        assert!(matches!(err, VegMetricsError::EmptyAnalysisRegion));
    }

    #[test]
    fn considered_count_grows_with_zenith_angle() {
        let mut previous = 0u64;
        for zenith in [10.0, 30.0, 50.0, 70.0, 90.0] {
            let considered = considered_pixels(64, zenith);
            assert!(
                considered >= previous,
                "zenith {} shrank the region: {} < {}",
                zenith,
                considered,
                previous
            );
            previous = considered;
        }
    }

    #[test]
    fn zenith_ninety_considers_inscribed_circle_only() {
        let considered = considered_pixels(64, 90.0);
        assert!(considered < 64 * 64);
        // The inscribed circle holds roughly pi/4 of the square.
        let expected = std::f64::consts::FRAC_PI_4 * 64.0 * 64.0;
        assert!((considered as f64 - expected).abs() < expected * 0.05);
    }

    #[test]
    fn rejects_out_of_range_zenith() {
        let buffer = PixelBuffer::filled(4, 4, GREEN).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness)
            .with_zenith_angle(120.0);
        assert!(matches!(
            analyze_canopy(&request).unwrap_err(),
            VegMetricsError::InvalidParameter(_)
        ));
    }

    #[test]
    fn rejects_edge_detection() {
        let buffer = PixelBuffer::filled(4, 4, GREEN).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::EdgeDetection);
        assert!(matches!(
            analyze_canopy(&request).unwrap_err(),
            VegMetricsError::UnsupportedMethod {
                analyzer: "canopy",
                ..
            }
        ));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let buffer = PixelBuffer::filled(32, 32, Rgb::new(60, 140, 50)).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::ColorRatio);
        let first = analyze_canopy(&request).unwrap();
        let second = analyze_canopy(&request).unwrap();
        assert_eq!(first.counts, second.counts);
        assert_approx_eq!(first.canopy_cover_pct, second.canopy_cover_pct);
    }

    #[test]
    fn progress_reaches_completion() {
        let calls = AtomicU32::new(0);
        let last_pct = AtomicU32::new(0);
        let progress = |pct: u8, _stage: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            last_pct.store(pct as u32, Ordering::SeqCst);
        };

        let buffer = PixelBuffer::filled(120, 120, GREEN).unwrap();
        let request = CanopyRequest::new(&buffer, ClassificationMethod::BrightnessGreenness)
            .with_progress(&progress);
        analyze_canopy(&request).unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(last_pct.load(Ordering::SeqCst), 100);
    }
}
