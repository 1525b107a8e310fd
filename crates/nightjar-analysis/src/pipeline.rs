//! Trait seams for the three pipeline components and the [`Pipeline`] triple
//! that binds them.

use crate::error::PipelineError;
use crate::types::{Chunk, RawAudio};
use chrono::NaiveDate;
use nightjar_foundation::AudioError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Turns an audio file into fixed-duration chunks.
pub trait Preprocessor: Send {
    /// Name tag; must match the model's.
    fn name(&self) -> &str;

    /// Decode the file into mono samples. Fails with an [`AudioError`] on
    /// unsupported or corrupt audio and propagates file-not-found.
    fn read(&self, path: &Path) -> Result<RawAudio, AudioError>;

    /// Window the decoded audio into model-sized chunks.
    fn chunk(&self, raw: &RawAudio) -> Vec<Chunk>;
}

/// Maps one chunk to per-label confidence scores.
pub trait Model: Send {
    fn name(&self) -> &str;

    fn labels(&self) -> &[String];

    fn predict(&mut self, chunk: &Chunk) -> Result<HashMap<String, f32>, PipelineError>;
}

/// Maps (lat, lon, date, threshold) to the set of labels plausibly present.
pub trait SpeciesPredictor: Send {
    fn name(&self) -> &str;

    fn predict(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
        threshold: f32,
    ) -> Result<HashSet<String>, PipelineError>;
}

/// The (Preprocessor, Model, SpeciesPredictor) triple. All components must
/// carry the same name tag (the species predictor may be absent); replaced
/// wholesale on a pipeline change, never mutated in place.
pub struct Pipeline {
    preprocessor: Box<dyn Preprocessor>,
    model: Box<dyn Model>,
    species: Option<Box<dyn SpeciesPredictor>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.model.name())
            .field("has_species", &self.species.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        preprocessor: Box<dyn Preprocessor>,
        model: Box<dyn Model>,
        species: Option<Box<dyn SpeciesPredictor>>,
    ) -> Result<Self, PipelineError> {
        let tag = model.name();
        let compatible = preprocessor.name() == tag
            && species.as_ref().map_or(true, |s| s.name() == tag);
        if !compatible {
            return Err(PipelineError::IncompatibleComponents {
                preprocessor: preprocessor.name().to_string(),
                model: tag.to_string(),
                species: species.as_ref().map(|s| s.name().to_string()),
            });
        }
        Ok(Self {
            preprocessor,
            model,
            species,
        })
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn preprocessor(&self) -> &dyn Preprocessor {
        self.preprocessor.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn Model {
        self.model.as_mut()
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn species(&self) -> Option<&dyn SpeciesPredictor> {
        self.species.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::mock::{MockModel, MockPreprocessor, StaticSpeciesPredictor};

    #[test]
    fn matching_tags_are_accepted() {
        let pipeline = Pipeline::new(
            Box::new(MockPreprocessor::new("mock")),
            Box::new(MockModel::new("mock")),
            None,
        )
        .unwrap();
        assert_eq!(pipeline.name(), "mock");
    }

    #[test]
    fn species_predictor_may_be_absent() {
        assert!(Pipeline::new(
            Box::new(MockPreprocessor::new("mock")),
            Box::new(MockModel::new("mock")),
            None,
        )
        .is_ok());
    }

    #[test]
    fn mismatched_model_tag_is_rejected() {
        let err = Pipeline::new(
            Box::new(MockPreprocessor::new("mock")),
            Box::new(MockModel::new("other")),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::IncompatibleComponents { .. }
        ));
    }

    #[test]
    fn mismatched_species_tag_is_rejected() {
        let species = StaticSpeciesPredictor::new("other", ["robin"]);
        let err = Pipeline::new(
            Box::new(MockPreprocessor::new("mock")),
            Box::new(MockModel::new("mock")),
            Some(Box::new(species)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::IncompatibleComponents { species: Some(_), .. }
        ));
    }
}
