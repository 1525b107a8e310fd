//! Pipeline component configuration.
//!
//! These structs round-trip through the per-run configuration snapshot, so a
//! past output directory is sufficient to reconstruct its exact pipeline.

use crate::error::PipelineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    /// Target sample rate chunks are produced at
    pub sample_rate_hz: u32,
    /// Chunk duration in seconds
    pub chunk_seconds: f32,
    /// Overlap between consecutive chunks in seconds
    pub overlap_seconds: f32,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            chunk_seconds: 3.0,
            overlap_seconds: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Steepness of the sigmoid mapping raw scores to confidences
    pub sigmoid_sensitivity: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sigmoid_sensitivity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Detections below this confidence are dropped
    pub min_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Presence threshold handed to the species predictor
    pub species_threshold: f32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.25,
            latitude: None,
            longitude: None,
            date: None,
            species_threshold: 0.03,
        }
    }
}

impl RecordingConfig {
    /// The species predictor is constructed only for a complete
    /// (latitude, longitude, date) triple; a partial triple is a
    /// configuration error, surfaced before any pipeline is built.
    pub fn location(&self) -> Result<Option<(f64, f64, NaiveDate)>, PipelineError> {
        match (self.latitude, self.longitude, self.date) {
            (Some(lat), Some(lon), Some(date)) => Ok(Some((lat, lon, date))),
            (None, None, None) => Ok(None),
            _ => Err(PipelineError::Config(
                "latitude, longitude and date must be provided together".into(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PipelineError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.species_threshold) {
            return Err(PipelineError::Config(format!(
                "species_threshold must be within [0, 1], got {}",
                self.species_threshold
            )));
        }
        self.location().map(|_| ())
    }
}

/// Everything a factory needs to construct a pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineBuildConfig {
    pub preprocessor: PreprocessorConfig,
    pub model: ModelConfig,
    pub recording: RecordingConfig,
}
