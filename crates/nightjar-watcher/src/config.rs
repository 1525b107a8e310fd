//! Watcher configuration and the per-run snapshot.

use crate::error::WatcherError;
use nightjar_analysis::{ModelConfig, PipelineBuildConfig, PreprocessorConfig, RecordingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// What happens to input files once they have a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Leave all inputs in place.
    #[default]
    Never,
    /// Leave inputs in place during normal operation; `clean_up()` deletes
    /// the ones it successfully reconciles.
    OnCleanup,
    /// Delete each input immediately after its result is written.
    Always,
}

impl DeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletePolicy::Never => "never",
            DeletePolicy::OnCleanup => "on_cleanup",
            DeletePolicy::Always => "always",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(DeletePolicy::Never),
            "on_cleanup" => Ok(DeletePolicy::OnCleanup),
            "always" => Ok(DeletePolicy::Always),
            other => Err(format!(
                "invalid delete policy {other:?}; expected one of never, on_cleanup, always"
            )),
        }
    }
}

fn default_pattern() -> String {
    ".wav".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_stop_timeout_secs() -> u64 {
    30
}

fn default_reanalyze() -> bool {
    true
}

/// Full watcher configuration. Serialized verbatim into each output
/// directory's snapshot so any past run can be reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub model_dir: PathBuf,
    pub model_name: String,
    /// File-suffix filter for intake, e.g. ".wav"
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    #[serde(default)]
    pub delete_policy: DeletePolicy,
    /// When false, `clean_up()` only records gaps instead of re-analyzing.
    #[serde(default = "default_reanalyze")]
    pub reanalyze_on_cleanup: bool,
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<(), WatcherError> {
        if !self.input_dir.is_dir() {
            return Err(WatcherError::Config(format!(
                "input directory {} does not exist",
                self.input_dir.display()
            )));
        }
        if !self.model_dir.is_dir() {
            return Err(WatcherError::Config(format!(
                "model directory {} does not exist",
                self.model_dir.display()
            )));
        }
        if self.pattern.is_empty() {
            return Err(WatcherError::Config("pattern must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(WatcherError::Config(
                "poll_interval_ms must be positive".into(),
            ));
        }
        self.recording.validate().map_err(WatcherError::from)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn build_config(&self) -> PipelineBuildConfig {
        PipelineBuildConfig {
            preprocessor: self.preprocessor.clone(),
            model: self.model.clone(),
            recording: self.recording.clone(),
        }
    }
}

pub const SNAPSHOT_FILE: &str = "config.toml";

/// Configuration snapshot written into every timestamped output directory on
/// start and on every successful pipeline change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub created_at: String,
    pub output_dir: PathBuf,
    pub config: WatcherConfig,
}

impl Snapshot {
    pub fn write(output_dir: &Path, config: &WatcherConfig) -> Result<PathBuf, WatcherError> {
        let snapshot = Snapshot {
            created_at: chrono::Local::now().to_rfc3339(),
            output_dir: output_dir.to_path_buf(),
            config: config.clone(),
        };
        let text = toml::to_string_pretty(&snapshot)?;
        let path = output_dir.join(SNAPSHOT_FILE);
        std::fs::write(&path, text).map_err(|e| WatcherError::io(&path, e))?;
        tracing::debug!(
            target: "nightjar::watcher",
            path = %path.display(),
            model = %config.model_name,
            "configuration snapshot written"
        );
        Ok(path)
    }

    pub fn read(output_dir: &Path) -> Result<Snapshot, WatcherError> {
        let path = output_dir.join(SNAPSHOT_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| WatcherError::io(&path, e))?;
        toml::from_str(&text)
            .map_err(|e| WatcherError::Config(format!("bad snapshot {}: {e}", path.display())))
    }
}

/// Create a fresh timestamped directory under `output_root`. Never reuses an
/// existing directory; a same-second collision gets a numeric suffix.
pub fn create_timestamped_dir(output_root: &Path) -> Result<PathBuf, WatcherError> {
    std::fs::create_dir_all(output_root).map_err(|e| WatcherError::io(output_root, e))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut candidate = output_root.join(&stamp);
    let mut suffix = 1u32;
    while candidate.exists() {
        candidate = output_root.join(format!("{stamp}_{suffix}"));
        suffix += 1;
    }
    std::fs::create_dir(&candidate).map_err(|e| WatcherError::io(&candidate, e))?;
    Ok(candidate)
}
