// Shared output types for the analyzers, plus the small numeric helpers
// (rounding, Shannon entropy) the derived indices are built from.

use serde::{Deserialize, Serialize};

use crate::canopy::CanopyMeasurement;
use crate::profile::HeightProfile;
use crate::quadrat::QuadratMeasurement;

/// Advisory progress callback: percentage 0-100 plus a stage label. May be
/// invoked from whatever thread performs the scan; must never be assumed to
/// run on a UI thread.
pub type ProgressFn = dyn Fn(u8, &str) + Send + Sync;

/// Pixel tallies for one analysis run.
///
/// `positive + negative <= total` always holds; a geometric mask may exclude
/// pixels from consideration entirely. A run with `total == 0` never produces
/// counts, it fails with `EmptyAnalysisRegion` upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
}

impl AggregateCounts {
    /// Positive share as a percentage, rounded to 2 decimals.
    pub fn positive_pct(&self) -> f64 {
        round2(self.positive as f64 / self.total as f64 * 100.0)
    }

    /// Negative share as a percentage, rounded to 2 decimals.
    pub fn negative_pct(&self) -> f64 {
        round2(self.negative as f64 / self.total as f64 * 100.0)
    }
}

/// One finished analysis, whichever analyzer produced it. Immutable once
/// returned; callers enrich a surrounding session record with site metadata,
/// never this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementResult {
    Canopy(CanopyMeasurement),
    Profile(HeightProfile),
    Quadrat(QuadratMeasurement),
}

/// Round to 2 decimal places (percentage precision).
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 3 decimal places (index precision).
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Shannon entropy `-sum(p ln p)` over the proportions of `weights`.
///
/// Zero weights contribute nothing; an all-zero input has entropy 0 rather
/// than NaN.
pub fn shannon_entropy(weights: &[f64]) -> f64 {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return 0.0;
    }

    -weights
        .iter()
        .filter(|&&w| w > 0.0)
        .map(|&w| {
            let p = w / sum;
            p * p.ln()
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn counts_percentages_round_to_two_decimals() {
        let counts = AggregateCounts {
            total: 3,
            positive: 1,
            negative: 2,
        };
        assert_approx_eq!(counts.positive_pct(), 33.33);
        assert_approx_eq!(counts.negative_pct(), 66.67);
    }

    #[test]
    fn shannon_entropy_of_uniform_split_is_ln_n() {
        let entropy = shannon_entropy(&[25.0, 25.0, 25.0, 25.0]);
        assert_approx_eq!(entropy, (4.0f64).ln(), 1e-12);
    }

    #[test]
    fn shannon_entropy_ignores_zero_weights() {
        assert_approx_eq!(
            shannon_entropy(&[50.0, 0.0, 50.0]),
            (2.0f64).ln(),
            1e-12
        );
    }

    #[test]
    fn shannon_entropy_of_empty_or_zero_input_is_zero() {
        assert_approx_eq!(shannon_entropy(&[]), 0.0);
        assert_approx_eq!(shannon_entropy(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn shannon_entropy_of_single_class_is_zero() {
        assert_approx_eq!(shannon_entropy(&[80.0]), 0.0);
    }
}
