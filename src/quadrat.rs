//! Daubenmire-frame ground-cover analyzer: classifies quadrat pixels into
//! cover categories and derives composition and diversity figures.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::buffer::{PixelBuffer, Rgb};
use crate::errors::{Result, VegMetricsError};
use crate::measurement::{round2, round3, shannon_entropy};

/// Rows between progress checkpoints.
const PROGRESS_ROW_INTERVAL: u32 = 50;

/// Cover share a species needs to be listed as dominant.
const DOMINANT_COVER_MIN_PCT: f64 = 10.0;

/// Ground-cover categories of the Daubenmire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverClass {
    Vegetation,
    Litter,
    BareSoil,
    Rock,
}

impl CoverClass {
    pub const ALL: [CoverClass; 4] = [
        CoverClass::Vegetation,
        CoverClass::Litter,
        CoverClass::BareSoil,
        CoverClass::Rock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vegetation => "vegetation",
            Self::Litter => "litter",
            Self::BareSoil => "bare_soil",
            Self::Rock => "rock",
        }
    }
}

/// Multi-class pixel rule for ground cover. The default color-rule table is
/// one implementation; site-specific rule sets plug in behind this trait.
pub trait CoverClassifier: Sync {
    fn classify(&self, px: Rgb) -> CoverClass;
}

/// Default color-rule table.
///
/// Heuristic, in priority order: green dominance reads as live vegetation;
/// a red-over-green-over-blue cast as litter; low channel spread at decent
/// brightness as rock; everything else as bare soil.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorRuleClassifier;

impl CoverClassifier for ColorRuleClassifier {
    fn classify(&self, px: Rgb) -> CoverClass {
        let (r, g, b) = (px.r as i32, px.g as i32, px.b as i32);
        let spread = r.max(g).max(b) - r.min(g).min(b);

        if g > r && g > b && g > 60 {
            CoverClass::Vegetation
        } else if r > g && g > b && r > 80 {
            CoverClass::Litter
        } else if spread < 30 && px.brightness() > 90.0 {
            CoverClass::Rock
        } else {
            CoverClass::BareSoil
        }
    }
}

/// One quadrat analysis request.
pub struct QuadratRequest<'a> {
    pub buffer: &'a PixelBuffer,
    pub classifier: &'a dyn CoverClassifier,
    pub on_progress: Option<&'a (dyn Fn(u8, &str) + Send + Sync)>,
}

impl<'a> QuadratRequest<'a> {
    pub fn new(buffer: &'a PixelBuffer, classifier: &'a dyn CoverClassifier) -> Self {
        Self {
            buffer,
            classifier,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: &'a (dyn Fn(u8, &str) + Send + Sync)) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// Per-category pixel tallies for one quadrat frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub vegetation: u64,
    pub litter: u64,
    pub bare_soil: u64,
    pub rock: u64,
}

impl ClassCounts {
    pub fn total(&self) -> u64 {
        self.vegetation + self.litter + self.bare_soil + self.rock
    }

    pub fn get(&self, class: CoverClass) -> u64 {
        match class {
            CoverClass::Vegetation => self.vegetation,
            CoverClass::Litter => self.litter,
            CoverClass::BareSoil => self.bare_soil,
            CoverClass::Rock => self.rock,
        }
    }

    fn add(&mut self, class: CoverClass) {
        match class {
            CoverClass::Vegetation => self.vegetation += 1,
            CoverClass::Litter => self.litter += 1,
            CoverClass::BareSoil => self.bare_soil += 1,
            CoverClass::Rock => self.rock += 1,
        }
    }
}

/// Species identity is field metadata, not something pixel rules can supply;
/// callers attach observations after the frame has been classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesObservation {
    pub name: String,
    pub cover_pct: f64,
}

/// Diversity figures over attached species observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversitySummary {
    pub species_count: usize,
    /// Shannon index over species cover proportions, 3 decimals.
    pub shannon_index: f64,
    /// Pielou evenness `H / ln(S)`, 3 decimals; 0 when S <= 1.
    pub evenness_index: f64,
    /// Species holding at least 10% cover, strongest first.
    pub dominant_species: Vec<String>,
}

/// Compute diversity indices from species observations.
pub fn summarize_diversity(observations: &[SpeciesObservation]) -> DiversitySummary {
    let covers: Vec<f64> = observations.iter().map(|o| o.cover_pct.max(0.0)).collect();
    let species_count = observations.len();

    let shannon = shannon_entropy(&covers);
    let evenness = if species_count > 1 {
        shannon / (species_count as f64).ln()
    } else {
        0.0
    };

    let mut ranked: Vec<&SpeciesObservation> = observations.iter().collect();
    ranked.sort_by(|a, b| {
        b.cover_pct
            .partial_cmp(&a.cover_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let dominant_species = ranked
        .iter()
        .filter(|o| o.cover_pct >= DOMINANT_COVER_MIN_PCT)
        .map(|o| o.name.clone())
        .collect();

    DiversitySummary {
        species_count,
        shannon_index: round3(shannon),
        evenness_index: round3(evenness),
        dominant_species,
    }
}

/// Ground-cover composition for a single quadrat frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadratMeasurement {
    pub vegetation_pct: f64,
    pub litter_pct: f64,
    pub bare_soil_pct: f64,
    pub rock_pct: f64,
    /// Vegetation plus litter, 2 decimals.
    pub total_cover_pct: f64,
    /// Bare soil plus rock, 2 decimals.
    pub bare_ground_pct: f64,
    pub counts: ClassCounts,
    pub diversity: Option<DiversitySummary>,
    pub elapsed_ms: u64,
}

impl QuadratMeasurement {
    /// Attach post-hoc species observations and their diversity summary.
    pub fn with_species(mut self, observations: &[SpeciesObservation]) -> Self {
        self.diversity = Some(summarize_diversity(observations));
        self
    }
}

/// Classify every pixel of a quadrat frame into a cover category.
pub fn analyze_quadrat(request: &QuadratRequest) -> Result<QuadratMeasurement> {
    let started = Instant::now();
    let buffer = request.buffer;

    let mut counts = ClassCounts::default();
    for y in 0..buffer.height() {
        if y % PROGRESS_ROW_INTERVAL == 0 {
            if let Some(progress) = request.on_progress {
                let pct = (y as f64 / buffer.height() as f64 * 100.0) as u8;
                progress(pct, "classifying ground cover");
            }
        }

        for x in 0..buffer.width() {
            counts.add(request.classifier.classify(buffer.get(x, y)));
        }
    }

    let total = counts.total();
    if total == 0 {
        return Err(VegMetricsError::EmptyAnalysisRegion);
    }

    if let Some(progress) = request.on_progress {
        progress(100, "deriving composition");
    }

    let pct = |count: u64| round2(count as f64 / total as f64 * 100.0);

    Ok(QuadratMeasurement {
        vegetation_pct: pct(counts.vegetation),
        litter_pct: pct(counts.litter),
        bare_soil_pct: pct(counts.bare_soil),
        rock_pct: pct(counts.rock),
        total_cover_pct: pct(counts.vegetation + counts.litter),
        bare_ground_pct: pct(counts.bare_soil + counts.rock),
        counts,
        diversity: None,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
