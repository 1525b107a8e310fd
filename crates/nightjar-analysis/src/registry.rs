//! Pipeline registry.
//!
//! Pipelines are registered at compile time as factories and selected at run
//! time by name; each name corresponds to a directory under the model root
//! holding that pipeline's artifacts. This replaces loading arbitrary plugin
//! code from the model directory.

use crate::config::PipelineBuildConfig;
use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use std::path::{Path, PathBuf};

/// Factory for one named pipeline kind.
pub trait PipelineFactory: Send + Sync {
    /// The pipeline name; doubles as the model subdirectory name.
    fn name(&self) -> &str;

    /// Verify the model directory carries everything this pipeline needs,
    /// without constructing it. Absence of required artifacts is an error
    /// here, not at first use.
    fn check_requirements(&self, model_dir: &Path) -> Result<(), PipelineError>;

    fn create(
        &self,
        model_dir: &Path,
        build: &PipelineBuildConfig,
    ) -> Result<Pipeline, PipelineError>;
}

/// Registry mapping pipeline names to factories, resolved against one model
/// root directory.
pub struct PipelineRegistry {
    model_root: PathBuf,
    factories: Vec<Box<dyn PipelineFactory>>,
}

impl PipelineRegistry {
    pub fn new(model_root: impl Into<PathBuf>) -> Self {
        Self {
            model_root: model_root.into(),
            factories: Vec::new(),
        }
    }

    /// Registry with the built-in pipelines registered.
    pub fn with_builtins(model_root: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new(model_root);
        registry.register(Box::new(crate::plugins::energy::EnergyPipelineFactory));
        registry.register(Box::new(crate::plugins::mock::MockPipelineFactory::default()));
        registry
    }

    pub fn register(&mut self, factory: Box<dyn PipelineFactory>) {
        self.factories.push(factory);
    }

    pub fn model_root(&self) -> &Path {
        &self.model_root
    }

    /// All registered names, whether or not their artifacts are present.
    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|f| f.name().to_string()).collect()
    }

    /// Names whose model-directory requirements are currently satisfied.
    pub fn available(&self) -> Vec<String> {
        self.factories
            .iter()
            .filter(|f| f.check_requirements(&self.model_dir(f.name())).is_ok())
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Validate that `name` is registered and its artifacts exist. This is
    /// the fail-fast check the hot-swap runs before taking any side effect.
    pub fn check(&self, name: &str) -> Result<(), PipelineError> {
        let factory = self.factory(name)?;
        factory.check_requirements(&self.model_dir(name))
    }

    pub fn create(
        &self,
        name: &str,
        build: &PipelineBuildConfig,
    ) -> Result<Pipeline, PipelineError> {
        let factory = self.factory(name)?;
        factory.create(&self.model_dir(name), build)
    }

    fn factory(&self, name: &str) -> Result<&dyn PipelineFactory, PipelineError> {
        self.factories
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
            .ok_or_else(|| PipelineError::UnknownPipeline {
                name: name.to_string(),
                known: self.names(),
            })
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.model_root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unknown_name_lists_registered_pipelines() {
        let root = TempDir::new().unwrap();
        let registry = PipelineRegistry::with_builtins(root.path());
        let err = registry.check("no-such-pipeline").unwrap_err();
        match err {
            PipelineError::UnknownPipeline { name, known } => {
                assert_eq!(name, "no-such-pipeline");
                assert!(known.contains(&"energy".to_string()));
                assert!(known.contains(&"mock".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mock_requires_its_model_directory() {
        let root = TempDir::new().unwrap();
        let registry = PipelineRegistry::with_builtins(root.path());
        assert!(registry.check("mock").is_err());

        std::fs::create_dir(root.path().join("mock")).unwrap();
        registry.check("mock").unwrap();
        assert_eq!(registry.available(), vec!["mock".to_string()]);
    }

    #[test]
    fn create_builds_a_working_pipeline() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("mock")).unwrap();
        let registry = PipelineRegistry::with_builtins(root.path());
        let pipeline = registry
            .create("mock", &PipelineBuildConfig::default())
            .unwrap();
        assert_eq!(pipeline.name(), "mock");
    }
}
