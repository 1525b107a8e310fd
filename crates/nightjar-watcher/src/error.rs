use nightjar_analysis::PipelineError;
use nightjar_foundation::{AudioError, StateError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the watcher and its worker.
///
/// Configuration and process-lifecycle errors are raised synchronously
/// before any side effect; errors originating inside the worker cross the
/// thread boundary only through the error channel and surface via
/// [`crate::Watcher::drain_errors`].
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("watcher is still running; stop it before starting again")]
    AlreadyRunning,

    #[error("cannot {operation}: no worker is running")]
    NotRunning { operation: &'static str },

    #[error("worker failed to start: {0}")]
    WorkerSpawn(String),

    #[error("filesystem watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to serialize configuration snapshot: {0}")]
    Snapshot(#[from] toml::ser::Error),

    #[error("failed to write result file: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Both the pipeline swap and the rollback to the previous pipeline
    /// failed; the watcher is stopped and needs operator attention.
    #[error(
        "pipeline swap to {attempted:?} failed ({swap}) and rollback also failed ({rollback}); watcher stopped"
    )]
    RollbackFailed {
        attempted: String,
        swap: Box<WatcherError>,
        rollback: Box<WatcherError>,
    },
}

impl WatcherError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WatcherError::Io {
            path: path.into(),
            source,
        }
    }
}
