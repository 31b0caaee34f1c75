// src/lib.rs - Library interface for VegMetricsR

pub mod batch;
pub mod buffer;
pub mod canopy;
pub mod classify;
pub mod config;
pub mod errors;
pub mod image_io;
pub mod measurement;
pub mod output;
pub mod profile;
pub mod quadrat;

// Re-export commonly used types and functions
pub use errors::{Result, VegMetricsError};
pub use config::{AnalysisMode, Config, MethodChoice};
pub use buffer::{PixelBuffer, Rgb};
pub use image_io::{get_image_files_in_dir, load_image, InputImage};

// Re-export the classifier surface
pub use classify::{
    count_frame,
    rgb_to_hsv,
    ClassificationMethod,
    DEFAULT_BRIGHTNESS_THRESHOLD,
    DEFAULT_GREEN_THRESHOLD,
};

// Re-export the analyzers
pub use canopy::{analyze_canopy, CanopyMeasurement, CanopyRequest};
pub use profile::{
    analyze_profile,
    DensityLabel,
    HeightProfile,
    HeightReading,
    ProfileRequest,
};
pub use quadrat::{
    analyze_quadrat,
    summarize_diversity,
    ColorRuleClassifier,
    CoverClass,
    CoverClassifier,
    DiversitySummary,
    QuadratMeasurement,
    QuadratRequest,
    SpeciesObservation,
};

// Re-export aggregation and batch types
pub use measurement::{shannon_entropy, AggregateCounts, MeasurementResult, ProgressFn};
pub use batch::{process_batch, BatchOptions, CancelToken, ItemFailure, ItemOutcome};
pub use output::{
    write_canopy_csv,
    write_profile_csv,
    write_quadrat_csv,
    write_session_json,
    SessionEntry,
    SessionFailure,
    SessionRecord,
};
