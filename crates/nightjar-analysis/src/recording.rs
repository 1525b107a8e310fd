//! A unit of work binding one audio file to one pipeline.

use crate::config::RecordingConfig;
use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::types::{ChunkScores, Detection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Binds one audio file path at a time to a pipeline and produces filtered
/// detections.
///
/// A Recording is created once per pipeline and reused across files — the
/// path is rebound per file so model state is not reloaded. It is destroyed
/// (or its pipeline swapped via [`Recording::set_pipeline`]) when the
/// pipeline changes.
pub struct Recording {
    path: Option<PathBuf>,
    pipeline: Pipeline,
    config: RecordingConfig,
    /// Empty set means no species restriction.
    allowed_species: HashSet<String>,
    analyzed: bool,
    chunks: Vec<ChunkScores>,
}

impl Recording {
    pub fn new(pipeline: Pipeline, config: &RecordingConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let allowed_species = Self::allowed_species(&pipeline, config)?;
        Ok(Self {
            path: None,
            pipeline,
            config: config.clone(),
            allowed_species,
            analyzed: false,
            chunks: Vec::new(),
        })
    }

    fn allowed_species(
        pipeline: &Pipeline,
        config: &RecordingConfig,
    ) -> Result<HashSet<String>, PipelineError> {
        match config.location()? {
            Some((lat, lon, date)) => match pipeline.species() {
                Some(predictor) => {
                    let allowed = predictor.predict(lat, lon, date, config.species_threshold)?;
                    tracing::debug!(
                        target: "nightjar::analysis",
                        pipeline = pipeline.name(),
                        allowed = allowed.len(),
                        "species restriction active"
                    );
                    Ok(allowed)
                }
                None => Err(PipelineError::Config(
                    "location provided but the pipeline has no species predictor".into(),
                )),
            },
            None => Ok(HashSet::new()),
        }
    }

    /// Bind the next file; clears the accumulator and the analyzed flag.
    pub fn bind(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
        self.analyzed = false;
        self.chunks.clear();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_analyzed(&self) -> bool {
        self.analyzed
    }

    pub fn pipeline_name(&self) -> &str {
        self.pipeline.name()
    }

    /// Read, chunk, and score the bound file. Per-chunk scores accumulate
    /// keyed by the chunk's (start, end) window.
    pub fn analyze(&mut self) -> Result<(), PipelineError> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| PipelineError::Config("no file bound to this recording".into()))?;

        let raw = self.pipeline.preprocessor().read(&path)?;
        let chunks = self.pipeline.preprocessor().chunk(&raw);
        tracing::debug!(
            target: "nightjar::analysis",
            path = %path.display(),
            duration_s = raw.duration_s(),
            chunks = chunks.len(),
            "analyzing recording"
        );

        self.chunks.clear();
        for chunk in &chunks {
            let scores = self.pipeline.model_mut().predict(chunk)?;
            self.chunks.push(ChunkScores {
                start_s: chunk.start_s,
                end_s: chunk.end_s,
                scores,
            });
        }
        self.analyzed = true;
        Ok(())
    }

    /// The flattened, confidence- and species-filtered detections.
    ///
    /// Calling this before `analyze()` has completed is a usage error: it
    /// warns and returns whatever has accumulated (possibly nothing) rather
    /// than panicking. The watcher enforces the ordering; this is a
    /// safety net.
    pub fn detections(&self) -> Vec<Detection> {
        if !self.analyzed {
            tracing::warn!(
                target: "nightjar::analysis",
                path = ?self.path,
                "detections requested before analyze() completed"
            );
        }
        let mut detections = Vec::new();
        for chunk in &self.chunks {
            for (label, &confidence) in &chunk.scores {
                if confidence < self.config.min_confidence {
                    continue;
                }
                if !self.allowed_species.is_empty() && !self.allowed_species.contains(label) {
                    continue;
                }
                detections.push(Detection {
                    start_s: chunk.start_s,
                    end_s: chunk.end_s,
                    label: label.clone(),
                    confidence,
                });
            }
        }
        detections
    }

    /// Swap the bound pipeline without re-instantiating the Recording.
    ///
    /// Re-validates name-tag compatibility and the species restriction; on
    /// failure the old pipeline stays in place.
    pub fn set_pipeline(&mut self, pipeline: Pipeline) -> Result<(), PipelineError> {
        let allowed_species = Self::allowed_species(&pipeline, &self.config)?;
        self.pipeline = pipeline;
        self.allowed_species = allowed_species;
        self.reset();
        Ok(())
    }

    /// Clear the accumulated per-chunk scores and the analyzed flag.
    pub fn reset(&mut self) {
        self.analyzed = false;
        self.chunks.clear();
    }
}
