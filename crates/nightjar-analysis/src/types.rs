//! Core data types for the analysis pipeline.

use std::collections::HashMap;

/// Decoded audio: mono samples at a known rate.
#[derive(Debug, Clone)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn duration_s(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// One fixed-duration window of samples, the unit a model consumes.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Start offset within the recording, in seconds
    pub start_s: f32,
    /// End offset within the recording, in seconds
    pub end_s: f32,
    pub samples: Vec<f32>,
}

/// Per-chunk label confidences, keyed by the chunk's time window.
#[derive(Debug, Clone)]
pub struct ChunkScores {
    pub start_s: f32,
    pub end_s: f32,
    pub scores: HashMap<String, f32>,
}

/// One classification result surviving filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub start_s: f32,
    pub end_s: f32,
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}
