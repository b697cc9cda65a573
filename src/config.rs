use crate::error::Result;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Edge detector thresholds used before line extraction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CannyParams {
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub aperture: i32,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            aperture: 3,
        }
    }
}

/// Probabilistic Hough transform parameters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct HoughParams {
    // in px
    pub rho: f64,
    pub theta_degrees: f64,
    pub threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
}

impl HoughParams {
    #[inline]
    pub fn theta(&self) -> f64 {
        self.theta_degrees.to_radians()
    }
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta_degrees: 1.0,
            threshold: 40,
            min_line_length: 40.0,
            max_line_gap: 5.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrainingParams {
    /// Inverse of the L2 penalty strength (`C`).
    pub inverse_regularization: f64,
    pub max_iterations: usize,
    /// Optimisation stops once the largest gradient component drops below this.
    pub tolerance: f64,
    /// Leading share of the corpus (in listing order) used for training.
    pub train_fraction: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            inverse_regularization: 1.0,
            max_iterations: 300,
            tolerance: 1e-4,
            train_fraction: 0.7,
        }
    }
}

/// What corpus preprocessing does when a single clip fails.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub edges: CannyParams,
    pub lines: HoughParams,
    pub training: TrainingParams,
    pub on_clip_error: ClipErrorPolicy,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;

        Ok(config)
    }
}
