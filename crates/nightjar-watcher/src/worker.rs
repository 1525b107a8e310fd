//! The worker thread running the file-watch loop.
//!
//! The worker owns its own notify watcher and constructs its own pipeline
//! and Recording; nothing is shared with the supervisor except the gate,
//! the error channel, and the metrics. Spawning performs a startup
//! handshake so `Watcher::start()` is all-or-nothing: either the pipeline
//! built and the filesystem watch is installed, or the caller gets the
//! error and no worker is left behind.

use crate::config::{DeletePolicy, WatcherConfig};
use crate::error::WatcherError;
use crate::handler::{AnalysisEventHandler, Dispatch};
use crate::results;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nightjar_analysis::{PipelineRegistry, Recording};
use nightjar_foundation::WorkGate;
use nightjar_telemetry::WatcherMetrics;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_TICK: Duration = Duration::from_millis(100);

pub(crate) struct WorkerContext {
    pub config: WatcherConfig,
    pub output_dir: PathBuf,
    pub gate: Arc<WorkGate>,
    pub registry: Arc<PipelineRegistry>,
    pub metrics: WatcherMetrics,
    pub error_tx: Sender<WatcherError>,
}

/// Handle to the dedicated worker thread.
pub(crate) struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    done_rx: Receiver<()>,
}

impl WorkerHandle {
    pub fn spawn(ctx: WorkerContext) -> Result<Self, WatcherError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), WatcherError>>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_shutdown = shutdown.clone();
        let thread = thread::Builder::new()
            .name("nightjar-worker".into())
            .spawn(move || worker_main(ctx, thread_shutdown, ready_tx, done_tx))
            .map_err(|e| WatcherError::WorkerSpawn(e.to_string()))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                thread: Some(thread),
                shutdown,
                done_rx,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                Err(WatcherError::WorkerSpawn(
                    "worker did not report ready in time".into(),
                ))
            }
        }
    }

    /// Ask the loop to exit after the current dispatch.
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker to finish, bounded by `timeout`. Returns false if
    /// the worker is still running when the budget expires; the thread is
    /// then detached and will exit on its own once the current file
    /// completes.
    pub fn join(mut self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                self.thread.take();
                false
            }
        }
    }
}

fn worker_main(
    ctx: WorkerContext,
    shutdown: Arc<AtomicBool>,
    ready_tx: Sender<Result<(), WatcherError>>,
    done_tx: Sender<()>,
) {
    let startup = (|| -> Result<(Recording, RecommendedWatcher, Receiver<PathBuf>), WatcherError> {
        let pipeline = ctx
            .registry
            .create(&ctx.config.model_name, &ctx.config.build_config())?;
        let recording = Recording::new(pipeline, &ctx.config.recording)?;

        let (fs_tx, fs_rx) = crossbeam_channel::unbounded::<PathBuf>();
        let mut fs_watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    // Renames into the directory and writes after create both
                    // count as arrivals; duplicates are skipped downstream
                    // once a result exists.
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            let _ = fs_tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::warn!(
                    target: "nightjar::worker",
                    error = %e,
                    "filesystem watch error"
                ),
            },
            notify::Config::default().with_poll_interval(ctx.config.poll_interval()),
        )?;
        fs_watcher.watch(&ctx.config.input_dir, RecursiveMode::NonRecursive)?;
        Ok((recording, fs_watcher, fs_rx))
    })();

    let (recording, _fs_watcher, fs_rx) = match startup {
        Ok(parts) => {
            let _ = ready_tx.send(Ok(()));
            parts
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let mut watch_loop = WatchLoop {
        handler: AnalysisEventHandler::new(ctx.config.pattern.clone(), ctx.gate.clone()),
        recording,
        output_dir: ctx.output_dir,
        delete_policy: ctx.config.delete_policy,
        gate: ctx.gate,
        metrics: ctx.metrics,
        error_tx: ctx.error_tx,
    };
    watch_loop.run(&fs_rx, &shutdown);
    let _ = done_tx.send(());
}

struct WatchLoop {
    handler: AnalysisEventHandler,
    recording: Recording,
    output_dir: PathBuf,
    delete_policy: DeletePolicy,
    gate: Arc<WorkGate>,
    metrics: WatcherMetrics,
    error_tx: Sender<WatcherError>,
}

impl WatchLoop {
    fn run(&mut self, fs_rx: &Receiver<PathBuf>, shutdown: &AtomicBool) {
        tracing::info!(
            target: "nightjar::worker",
            pipeline = self.recording.pipeline_name(),
            "worker started"
        );

        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match fs_rx.recv_timeout(POLL_TICK) {
                Ok(path) => {
                    if self.handle_created(path) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.gate.set_done_analyzing(true);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!(target: "nightjar::worker", "worker stopped");
    }

    /// Returns true when the loop should exit (gate cancelled by stop).
    fn handle_created(&mut self, path: PathBuf) -> bool {
        let handler = &self.handler;
        let recording = &mut self.recording;
        let output_dir = &self.output_dir;
        let delete_policy = self.delete_policy;
        let metrics = &self.metrics;

        let dispatch = handler.on_created(&path, |p| {
            // Duplicate notifications and files a reconciliation pass
            // already covered are skipped.
            if results::has_result(output_dir, p) {
                tracing::debug!(
                    target: "nightjar::worker",
                    path = %p.display(),
                    "result already present; skipping"
                );
                return Ok(());
            }
            metrics.incr_files_seen();
            results::analyze_file(recording, p, output_dir, delete_policy, metrics).map(|_| ())
        });

        match dispatch {
            Dispatch::Ignored => false,
            Dispatch::Cancelled => true,
            Dispatch::Ran(Ok(())) => false,
            Dispatch::Ran(Err(e)) => {
                tracing::error!(
                    target: "nightjar::worker",
                    path = %path.display(),
                    error = %e,
                    "analysis failed"
                );
                let _ = self.error_tx.send(e);
                false
            }
        }
    }
}
