use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::{ClassificationMethod, DEFAULT_BRIGHTNESS_THRESHOLD, DEFAULT_GREEN_THRESHOLD};
use crate::errors::{Result, VegMetricsError};

/// Configuration for VegMetricsR
///
/// These values drive the CLI only; analyzers receive every parameter
/// explicitly through their request structs and carry no ambient defaults.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub input_path: String,
    pub output_dir: String,

    #[serde(default = "default_analysis_mode")]
    pub analysis_mode: AnalysisMode,

    #[serde(default = "default_method")]
    pub method: MethodChoice,

    #[serde(default = "default_green_threshold")]
    pub green_threshold: f64,

    #[serde(default = "default_brightness_threshold")]
    pub brightness_threshold: f64,

    #[serde(default = "default_zenith_angle")]
    pub zenith_angle_deg: f64,

    /// Pole heights for profile mode, one per photo in directory order.
    #[serde(default)]
    pub sample_heights_cm: Vec<u32>,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Site metadata copied into the session record; never read by the
    /// analyzers.
    #[serde(default)]
    pub site_name: Option<String>,

    #[serde(default)]
    pub note: Option<String>,
}

/// Analysis mode selector
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Upward hemispherical canopy frames
    Canopy,
    /// Horizontal vegetation height series
    Profile,
    /// Daubenmire ground-cover quadrats
    Quadrat,
}

/// Classification method selector; thresholds come from the sibling fields.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodChoice {
    BrightnessGreenness,
    ColorRatio,
    ColorThreshold,
    EdgeDetection,
    HeuristicCluster,
    BrightnessThreshold,
}

fn default_analysis_mode() -> AnalysisMode {
    AnalysisMode::Canopy
}

fn default_method() -> MethodChoice {
    MethodChoice::BrightnessGreenness
}

fn default_green_threshold() -> f64 {
    DEFAULT_GREEN_THRESHOLD
}

fn default_brightness_threshold() -> f64 {
    DEFAULT_BRIGHTNESS_THRESHOLD
}

fn default_zenith_angle() -> f64 {
    90.0
}

fn default_parallel() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: "./input".to_string(),
            output_dir: "./output".to_string(),
            analysis_mode: default_analysis_mode(),
            method: default_method(),
            green_threshold: DEFAULT_GREEN_THRESHOLD,
            brightness_threshold: DEFAULT_BRIGHTNESS_THRESHOLD,
            zenith_angle_deg: 90.0,
            sample_heights_cm: Vec::new(),
            use_parallel: true,
            concurrency: default_concurrency(),
            site_name: None,
            note: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            VegMetricsError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            VegMetricsError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Resolve the configured method and thresholds into a classifier.
    pub fn resolve_method(&self) -> ClassificationMethod {
        match self.method {
            MethodChoice::BrightnessGreenness => ClassificationMethod::BrightnessGreenness,
            MethodChoice::ColorRatio => ClassificationMethod::ColorRatio,
            MethodChoice::ColorThreshold => ClassificationMethod::ColorThreshold {
                threshold: self.green_threshold,
            },
            MethodChoice::EdgeDetection => ClassificationMethod::EdgeDetection,
            MethodChoice::HeuristicCluster => ClassificationMethod::HeuristicCluster,
            MethodChoice::BrightnessThreshold => ClassificationMethod::BrightnessThreshold {
                threshold: self.brightness_threshold,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let input_path = PathBuf::from(&self.input_path);
        if !input_path.exists() {
            return Err(VegMetricsError::InvalidPath(input_path));
        }

        if !(0.0..=90.0).contains(&self.zenith_angle_deg) {
            return Err(VegMetricsError::Config(
                "zenith_angle_deg must be between 0.0 and 90.0".to_string(),
            ));
        }

        if self.green_threshold <= 0.0 || self.green_threshold >= 1.0 {
            return Err(VegMetricsError::Config(
                "green_threshold must be between 0.0 and 1.0 exclusive".to_string(),
            ));
        }

        if self.brightness_threshold <= 0.0 || self.brightness_threshold > 255.0 {
            return Err(VegMetricsError::Config(
                "brightness_threshold must be between 0.0 and 255.0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(VegMetricsError::Config(
                "concurrency must be > 0".to_string(),
            ));
        }

        if self.analysis_mode == AnalysisMode::Profile && self.sample_heights_cm.is_empty() {
            return Err(VegMetricsError::Config(
                "profile mode requires sample_heights_cm".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VegMetricsError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content).map_err(VegMetricsError::Io)?;

        Ok(())
    }
}
