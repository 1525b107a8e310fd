use nightjar_foundation::AudioError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or running a classification pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown pipeline {name:?}; registered: {known:?}")]
    UnknownPipeline { name: String, known: Vec<String> },

    #[error(
        "incompatible pipeline components: preprocessor {preprocessor:?}, model {model:?}, species predictor {species:?}"
    )]
    IncompatibleComponents {
        preprocessor: String,
        model: String,
        species: Option<String>,
    },

    #[error("model artifact missing: {path}")]
    ModelArtifactMissing { path: PathBuf },

    #[error("labels file missing: {path}")]
    LabelsMissing { path: PathBuf },

    #[error("species presence model missing for pipeline {name:?}: {path}")]
    SpeciesModelMissing { name: String, path: PathBuf },

    #[error("inference failed: {0}")]
    Inference(String),
}
