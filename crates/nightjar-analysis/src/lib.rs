//! Classification pipeline abstraction.
//!
//! A pipeline is a (Preprocessor, Model, SpeciesPredictor) triple sharing one
//! name tag. Pipelines are built by name from a model directory through the
//! registry, bound to a [`Recording`], and replaced wholesale — never mutated
//! in place.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod plugins;
pub mod recording;
pub mod registry;
pub mod types;

pub use config::{ModelConfig, PipelineBuildConfig, PreprocessorConfig, RecordingConfig};
pub use error::PipelineError;
pub use pipeline::{Model, Pipeline, Preprocessor, SpeciesPredictor};
pub use recording::Recording;
pub use registry::{PipelineFactory, PipelineRegistry};
pub use types::{Chunk, ChunkScores, Detection, RawAudio};
