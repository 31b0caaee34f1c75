use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for VegMetricsR
#[derive(Error, Debug)]
pub enum VegMetricsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid image data: {width}x{height} at {channels} channels expects {expected} bytes, got {actual}")]
    InvalidImageData {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Analysis region contains no pixels")]
    EmptyAnalysisRegion,

    #[error("Got {images} images but {heights} sample heights")]
    InputCardinalityMismatch { images: usize, heights: usize },

    #[error("Duplicate sample height: {0} cm")]
    DuplicateSampleHeight(u32),

    #[error("Method {method} is not supported by the {analyzer} analyzer")]
    UnsupportedMethod {
        method: &'static str,
        analyzer: &'static str,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),

    #[error("Batch processing error: {0}")]
    Batch(String),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, VegMetricsError>;
