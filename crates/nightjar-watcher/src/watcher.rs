//! The watcher supervisor: owns the pipeline configuration, runs the intake
//! loop in a worker thread, and exposes the lifecycle operations.

use crate::cleanup::{self, CleanupReport};
use crate::config::{create_timestamped_dir, Snapshot, WatcherConfig};
use crate::error::WatcherError;
use crate::results;
use crate::worker::{WorkerContext, WorkerHandle};
use crossbeam_channel::{Receiver, Sender};
use nightjar_analysis::{
    ModelConfig, PipelineRegistry, PreprocessorConfig, Recording, RecordingConfig,
};
use nightjar_foundation::{RunState, StateCell, WorkGate};
use nightjar_telemetry::WatcherMetrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CLEANUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Supervises one worker thread watching one input directory.
///
/// State machine: Stopped -> Running -> Paused -> Running/Stopped. Exactly
/// one state holds at any time; every lifecycle operation validates the
/// transition before taking effect.
pub struct Watcher {
    config: WatcherConfig,
    registry: Arc<PipelineRegistry>,
    state: StateCell,
    gate: Arc<WorkGate>,
    worker: Option<WorkerHandle>,
    output_dir: Option<PathBuf>,
    metrics: WatcherMetrics,
    error_tx: Sender<WatcherError>,
    error_rx: Receiver<WatcherError>,
}

impl Watcher {
    /// Validates the configuration and the selected model name up front;
    /// a bad directory, unknown model, or partial location triple never
    /// produces a Watcher.
    pub fn new(config: WatcherConfig, registry: PipelineRegistry) -> Result<Self, WatcherError> {
        config.validate()?;
        registry.check(&config.model_name)?;
        let (error_tx, error_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            config,
            registry: Arc::new(registry),
            state: StateCell::new(),
            gate: Arc::new(WorkGate::new()),
            worker: None,
            output_dir: None,
            metrics: WatcherMetrics::default(),
            error_tx,
            error_rx,
        })
    }

    pub fn state(&self) -> RunState {
        self.state.current()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn metrics(&self) -> &WatcherMetrics {
        &self.metrics
    }

    /// The current timestamped output directory, if one exists yet.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Errors shipped out of the worker since the last drain.
    pub fn drain_errors(&self) -> Vec<WatcherError> {
        self.error_rx.try_iter().collect()
    }

    /// Spawn the worker. Creates a fresh timestamped output directory and
    /// writes the configuration snapshot into it first; on any failure all
    /// side effects are undone and the error surfaces — start is
    /// all-or-nothing.
    pub fn start(&mut self) -> Result<(), WatcherError> {
        if self.worker.is_some() {
            return Err(WatcherError::AlreadyRunning);
        }
        let output_dir = create_timestamped_dir(&self.config.output_root)?;
        if let Err(e) = Snapshot::write(&output_dir, &self.config) {
            let _ = std::fs::remove_dir_all(&output_dir);
            return Err(e);
        }
        if let Err(e) = self.spawn_worker_into(output_dir.clone()) {
            let _ = std::fs::remove_dir_all(&output_dir);
            return Err(e);
        }
        self.output_dir = Some(output_dir);
        tracing::info!(
            target: "nightjar::watcher",
            input = %self.config.input_dir.display(),
            model = %self.config.model_name,
            "watcher started"
        );
        Ok(())
    }

    fn spawn_worker_into(&mut self, output_dir: PathBuf) -> Result<(), WatcherError> {
        let gate = Arc::new(WorkGate::new());
        let handle = WorkerHandle::spawn(WorkerContext {
            config: self.config.clone(),
            output_dir,
            gate: gate.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            error_tx: self.error_tx.clone(),
        })?;
        gate.open();
        self.gate = gate;
        self.worker = Some(handle);
        self.state.transition(RunState::Running)?;
        Ok(())
    }

    /// Request graceful shutdown and join the worker with a bounded timeout.
    /// On expiry the worker is detached with a warning — the in-flight file
    /// may be lost, which reconciliation repairs later. The gate is always
    /// cleared and the handle nulled on return.
    pub fn stop(&mut self) -> Result<(), WatcherError> {
        let worker = self
            .worker
            .take()
            .ok_or(WatcherError::NotRunning { operation: "stop" })?;
        tracing::info!(target: "nightjar::watcher", "stopping worker");
        worker.request_stop();
        self.gate.cancel();
        let timeout = self.config.stop_timeout();
        if !worker.join(timeout) {
            tracing::warn!(
                target: "nightjar::watcher",
                timeout_secs = timeout.as_secs(),
                "worker did not stop in time; detached (in-flight file may be lost)"
            );
        }
        self.gate.close();
        self.state.transition(RunState::Stopped)?;
        self.metrics.log_summary();
        Ok(())
    }

    /// Close the gate on a live worker; new files queue FIFO until resumed.
    pub fn pause(&mut self) -> Result<(), WatcherError> {
        if self.worker.is_none() {
            return Err(WatcherError::NotRunning { operation: "pause" });
        }
        self.state.transition(RunState::Paused)?;
        self.gate.close();
        tracing::info!(target: "nightjar::watcher", "watcher paused");
        Ok(())
    }

    /// Reopen the gate on a paused worker.
    pub fn resume(&mut self) -> Result<(), WatcherError> {
        if self.worker.is_none() {
            return Err(WatcherError::NotRunning {
                operation: "resume",
            });
        }
        self.state.transition(RunState::Running)?;
        self.gate.open();
        tracing::info!(target: "nightjar::watcher", "watcher resumed");
        Ok(())
    }

    /// Stop then start with the same configuration. A stop-phase error
    /// propagates and leaves the watcher stopped.
    pub fn restart(&mut self) -> Result<(), WatcherError> {
        self.stop()?;
        self.start()
    }

    /// Hot-swap the pipeline: validate the new model name (no side effects
    /// on failure), stop the worker, replace the configuration, create a
    /// fresh timestamped output directory with a new snapshot, and restart.
    ///
    /// All-or-nothing: any post-validation failure rolls back to the
    /// previous configuration and output directory, leaving the watcher
    /// running with the old pipeline or cleanly stopped. A rollback that
    /// itself fails surfaces as [`WatcherError::RollbackFailed`].
    pub fn change_pipeline(
        &mut self,
        model_name: &str,
        preprocessor: PreprocessorConfig,
        model: ModelConfig,
        recording: RecordingConfig,
    ) -> Result<(), WatcherError> {
        self.registry.check(model_name)?;
        recording.validate().map_err(WatcherError::from)?;

        let prev_config = self.config.clone();
        let prev_output_dir = self.output_dir.clone();
        let was_active = self.worker.is_some();

        if was_active {
            self.stop()?;
        }

        self.config.model_name = model_name.to_string();
        self.config.preprocessor = preprocessor;
        self.config.model = model;
        self.config.recording = recording;

        match self.activate_new_output(was_active) {
            Ok(()) => {
                self.metrics.incr_pipeline_changes();
                tracing::info!(
                    target: "nightjar::watcher",
                    model = %self.config.model_name,
                    output_dir = ?self.output_dir,
                    "pipeline changed"
                );
                Ok(())
            }
            Err(swap_err) => self.roll_back(prev_config, prev_output_dir, was_active, swap_err),
        }
    }

    fn activate_new_output(&mut self, start_worker: bool) -> Result<(), WatcherError> {
        let output_dir = create_timestamped_dir(&self.config.output_root)?;
        if let Err(e) = Snapshot::write(&output_dir, &self.config) {
            let _ = std::fs::remove_dir_all(&output_dir);
            return Err(e);
        }
        if start_worker {
            if let Err(e) = self.spawn_worker_into(output_dir.clone()) {
                let _ = std::fs::remove_dir_all(&output_dir);
                return Err(e);
            }
        }
        self.output_dir = Some(output_dir);
        Ok(())
    }

    fn roll_back(
        &mut self,
        prev_config: WatcherConfig,
        prev_output_dir: Option<PathBuf>,
        was_active: bool,
        swap_err: WatcherError,
    ) -> Result<(), WatcherError> {
        let attempted = self.config.model_name.clone();
        self.config = prev_config;
        self.output_dir = prev_output_dir;

        if was_active {
            let rollback = match self.output_dir.clone() {
                Some(output_dir) => self.spawn_worker_into(output_dir),
                None => Err(WatcherError::Config(
                    "no previous output directory to roll back to".into(),
                )),
            };
            if let Err(rollback_err) = rollback {
                self.gate.close();
                return Err(WatcherError::RollbackFailed {
                    attempted,
                    swap: Box::new(swap_err),
                    rollback: Box::new(rollback_err),
                });
            }
        }

        tracing::warn!(
            target: "nightjar::watcher",
            attempted = %attempted,
            model = %self.config.model_name,
            error = %swap_err,
            "pipeline change rolled back"
        );
        Err(swap_err)
    }

    /// Build a Recording for the currently configured pipeline.
    pub fn build_recording(&self) -> Result<Recording, WatcherError> {
        let pipeline = self
            .registry
            .create(&self.config.model_name, &self.config.build_config())?;
        Recording::new(pipeline, &self.config.recording).map_err(WatcherError::from)
    }

    /// Analyze one file synchronously and write its result into the current
    /// output directory.
    pub fn analyze(
        &mut self,
        path: &Path,
        recording: &mut Recording,
    ) -> Result<PathBuf, WatcherError> {
        let output_dir = self.ensure_output_dir()?;
        results::analyze_file(
            recording,
            path,
            &output_dir,
            self.config.delete_policy,
            &self.metrics,
        )
    }

    /// Reconcile the input directory against the current output directory.
    ///
    /// Never runs concurrently with live intake: a running worker is paused
    /// and its in-flight dispatch drained first, then resumed afterwards.
    pub fn clean_up(&mut self) -> Result<CleanupReport, WatcherError> {
        let was_running = self.state.is_running();
        if was_running {
            self.pause()?;
        }
        if self.worker.is_some() {
            self.wait_for_idle(CLEANUP_DRAIN_TIMEOUT);
        }

        let output_dir = self.ensure_output_dir()?;
        let report = cleanup::reconcile(&self.config, &output_dir, &self.registry, &self.metrics);

        if was_running {
            self.resume()?;
        }
        report
    }

    fn wait_for_idle(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.gate.is_done_analyzing() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    target: "nightjar::watcher",
                    "in-flight analysis did not drain before cleanup"
                );
                return;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    fn ensure_output_dir(&mut self) -> Result<PathBuf, WatcherError> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let output_dir = create_timestamped_dir(&self.config.output_root)?;
        if let Err(e) = Snapshot::write(&output_dir, &self.config) {
            let _ = std::fs::remove_dir_all(&output_dir);
            return Err(e);
        }
        self.output_dir = Some(output_dir.clone());
        Ok(output_dir)
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.request_stop();
            self.gate.cancel();
            let _ = worker.join(Duration::from_secs(1));
        }
    }
}
