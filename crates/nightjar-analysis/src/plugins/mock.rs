//! Deterministic mock pipeline.
//!
//! Input files are plain text, one detection per line: `<label-index>
//! <confidence>`. The preprocessor encodes each line as a two-sample chunk
//! and the model decodes it back, so tests control exactly which detections
//! a file produces. Registered like a real pipeline; its model directory
//! needs no artifacts beyond the `mock/` directory itself (plus an optional
//! `species_presence_model` listing allowed labels).

use crate::config::PipelineBuildConfig;
use crate::error::PipelineError;
use crate::pipeline::{Model, Pipeline, Preprocessor, SpeciesPredictor};
use crate::registry::PipelineFactory;
use crate::types::{Chunk, RawAudio};
use chrono::NaiveDate;
use nightjar_foundation::AudioError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const MOCK_LABELS: [&str; 3] = ["robin", "sparrow", "owl"];

const CHUNK_SECONDS: f32 = 3.0;

pub struct MockPreprocessor {
    name: String,
}

impl MockPreprocessor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Preprocessor for MockPreprocessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, path: &Path) -> Result<RawAudio, AudioError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AudioError::from_io(path.to_path_buf(), e))?;
        let mut samples = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let mut fields = line.split_whitespace();
            let index: f32 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| AudioError::CorruptData {
                    path: path.to_path_buf(),
                    detail: format!("bad mock line {line:?}"),
                })?;
            let confidence: f32 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| AudioError::CorruptData {
                    path: path.to_path_buf(),
                    detail: format!("bad mock line {line:?}"),
                })?;
            samples.push(index);
            samples.push(confidence);
        }
        Ok(RawAudio {
            samples,
            sample_rate: 2,
        })
    }

    fn chunk(&self, raw: &RawAudio) -> Vec<Chunk> {
        raw.samples
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| Chunk {
                start_s: i as f32 * CHUNK_SECONDS,
                end_s: (i + 1) as f32 * CHUNK_SECONDS,
                samples: pair.to_vec(),
            })
            .collect()
    }
}

pub struct MockModel {
    name: String,
    labels: Vec<String>,
}

impl MockModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: MOCK_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl Model for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&mut self, chunk: &Chunk) -> Result<HashMap<String, f32>, PipelineError> {
        let &[index, confidence] = chunk.samples.as_slice() else {
            return Err(PipelineError::Inference(format!(
                "mock chunk must hold exactly two samples, got {}",
                chunk.samples.len()
            )));
        };
        let label = self
            .labels
            .get(index as usize)
            .ok_or_else(|| PipelineError::Inference(format!("label index {index} out of range")))?;
        Ok(HashMap::from([(label.clone(), confidence)]))
    }
}

/// Species predictor with a fixed allowed set; ignores location and date.
pub struct StaticSpeciesPredictor {
    name: String,
    allowed: HashSet<String>,
}

impl StaticSpeciesPredictor {
    pub fn new<I, S>(name: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl SpeciesPredictor for StaticSpeciesPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(
        &self,
        _latitude: f64,
        _longitude: f64,
        _date: NaiveDate,
        _threshold: f32,
    ) -> Result<HashSet<String>, PipelineError> {
        Ok(self.allowed.clone())
    }
}

/// A mock pipeline with no species restriction.
pub fn mock_pipeline() -> Pipeline {
    match Pipeline::new(
        Box::new(MockPreprocessor::new("mock")),
        Box::new(MockModel::new("mock")),
        None,
    ) {
        Ok(p) => p,
        Err(_) => unreachable!("mock components share one tag"),
    }
}

/// Factory for the mock pipeline. The name is configurable so tests can
/// register several distinct mock pipelines at once.
pub struct MockPipelineFactory {
    name: String,
}

impl Default for MockPipelineFactory {
    fn default() -> Self {
        Self::named("mock")
    }
}

impl MockPipelineFactory {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PipelineFactory for MockPipelineFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_requirements(&self, model_dir: &Path) -> Result<(), PipelineError> {
        if !model_dir.is_dir() {
            return Err(PipelineError::ModelArtifactMissing {
                path: model_dir.to_path_buf(),
            });
        }
        Ok(())
    }

    fn create(
        &self,
        model_dir: &Path,
        build: &PipelineBuildConfig,
    ) -> Result<Pipeline, PipelineError> {
        self.check_requirements(model_dir)?;
        let species = match build.recording.location()? {
            Some(_) => Some(Box::new(load_species(&self.name, model_dir)?) as Box<dyn SpeciesPredictor>),
            None => None,
        };
        Pipeline::new(
            Box::new(MockPreprocessor::new(self.name.clone())),
            Box::new(MockModel::new(self.name.clone())),
            species,
        )
    }
}

fn load_species(name: &str, model_dir: &Path) -> Result<StaticSpeciesPredictor, PipelineError> {
    let path = model_dir.join("species_presence_model");
    let text = std::fs::read_to_string(&path).map_err(|_| PipelineError::SpeciesModelMissing {
        name: name.to_string(),
        path: path.clone(),
    })?;
    Ok(StaticSpeciesPredictor::new(
        name,
        text.lines().map(str::trim).filter(|l| !l.is_empty()),
    ))
}
