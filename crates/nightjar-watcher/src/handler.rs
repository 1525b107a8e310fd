//! Filesystem-event adapter.
//!
//! Translates "file created" notifications into analysis dispatches, gated
//! by the worker's run/pause flag. Waiting on the gate is the only
//! suspension point in the worker's event loop besides the event channel
//! itself; the wait is cooperative and indefinite.

use crate::error::WatcherError;
use nightjar_foundation::{GateStatus, WorkGate};
use std::path::Path;
use std::sync::Arc;

/// Outcome of offering one filesystem event to the handler.
#[derive(Debug)]
pub enum Dispatch {
    /// Not a regular file with the configured suffix.
    Ignored,
    /// The gate was cancelled while waiting; the file was not analyzed.
    Cancelled,
    /// The callback ran.
    Ran(Result<(), WatcherError>),
}

pub struct AnalysisEventHandler {
    pattern: String,
    gate: Arc<WorkGate>,
}

impl AnalysisEventHandler {
    pub fn new(pattern: impl Into<String>, gate: Arc<WorkGate>) -> Self {
        Self {
            pattern: pattern.into(),
            gate,
        }
    }

    /// Whether the created entry is a regular file matching the pattern.
    pub fn wants(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        path.file_name()
            .map(|name| name.to_string_lossy().ends_with(&self.pattern))
            .unwrap_or(false)
    }

    /// Offer one created path. Blocks until the gate opens, then invokes the
    /// analysis callback. A paused watcher holds every new file here, FIFO
    /// by notification arrival, until resumed or stopped.
    pub fn on_created<F>(&self, path: &Path, analyze: F) -> Dispatch
    where
        F: FnOnce(&Path) -> Result<(), WatcherError>,
    {
        if !self.wants(path) {
            tracing::trace!(
                target: "nightjar::worker",
                path = %path.display(),
                "ignoring non-matching entry"
            );
            return Dispatch::Ignored;
        }
        match self.gate.wait_open() {
            GateStatus::Cancelled => Dispatch::Cancelled,
            GateStatus::Open => {
                self.gate.set_done_analyzing(false);
                let result = analyze(path);
                self.gate.set_done_analyzing(true);
                Dispatch::Ran(result)
            }
        }
    }
}
