use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Lifecycle state of the watcher. Exactly one variant holds at any time;
/// `is_running` / `is_paused` queries all read the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No worker thread exists.
    Stopped,
    /// Worker alive, gate open.
    Running,
    /// Worker alive, gate closed.
    Paused,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
            RunState::Paused => "paused",
        }
    }
}

#[derive(Error, Debug)]
#[error("invalid state transition: {from:?} -> {to:?}")]
pub struct StateError {
    pub from: RunState,
    pub to: RunState,
}

/// Validated lifecycle cell with a change broadcast for observers.
pub struct StateCell {
    state: Arc<RwLock<RunState>>,
    state_tx: Sender<RunState>,
    state_rx: Receiver<RunState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(RunState::Stopped)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: RunState) -> Result<(), StateError> {
        let mut current = self.state.write();

        let valid = matches!(
            (*current, new_state),
            (RunState::Stopped, RunState::Running)
                | (RunState::Running, RunState::Paused)
                | (RunState::Paused, RunState::Running)
                | (RunState::Running, RunState::Stopped)
                | (RunState::Paused, RunState::Stopped)
        );

        if !valid {
            return Err(StateError {
                from: *current,
                to: new_state,
            });
        }

        tracing::info!(
            target: "nightjar::state",
            from = current.as_str(),
            to = new_state.as_str(),
            "state transition"
        );
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> RunState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.current() == RunState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.current() == RunState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.current() == RunState::Stopped
    }

    pub fn subscribe(&self) -> Receiver<RunState> {
        self.state_rx.clone()
    }
}
