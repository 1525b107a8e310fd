//! The watcher core: process-lifecycle state machine, event-driven file
//! intake, pipeline hot-swap, and cleanup/reconciliation.
//!
//! A [`Watcher`] supervises one worker thread running the file-watch loop.
//! The two sides share nothing but a [`nightjar_foundation::WorkGate`], an
//! error channel, and the telemetry counters; the worker constructs its own
//! pipeline and [`nightjar_analysis::Recording`].

pub mod cleanup;
pub mod config;
pub mod error;
pub mod handler;
pub mod results;
pub mod watcher;
pub(crate) mod worker;

pub use cleanup::CleanupReport;
pub use config::{DeletePolicy, Snapshot, WatcherConfig};
pub use error::WatcherError;
pub use watcher::Watcher;
