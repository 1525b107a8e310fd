use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared metrics for cross-thread watcher monitoring.
///
/// Cloned into the worker thread; every field is an atomic counter, so the
/// supervisor can read a consistent-enough snapshot at any time without
/// locking.
#[derive(Clone, Default)]
pub struct WatcherMetrics {
    /// Matching files seen by the event handler
    pub files_seen: Arc<AtomicU64>,
    /// Files run through the pipeline (normal operation + cleanup)
    pub files_analyzed: Arc<AtomicU64>,
    /// Result files written
    pub results_written: Arc<AtomicU64>,
    /// Analyses that failed (decode errors, inference errors)
    pub analysis_errors: Arc<AtomicU64>,
    /// Input files deleted under the delete policy
    pub inputs_deleted: Arc<AtomicU64>,
    /// Completed reconciliation passes
    pub cleanup_passes: Arc<AtomicU64>,
    /// Successful pipeline hot-swaps
    pub pipeline_changes: Arc<AtomicU64>,
}

/// Plain-value copy of the counters, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_seen: u64,
    pub files_analyzed: u64,
    pub results_written: u64,
    pub analysis_errors: u64,
    pub inputs_deleted: u64,
    pub cleanup_passes: u64,
    pub pipeline_changes: u64,
}

impl WatcherMetrics {
    pub fn incr_files_seen(&self) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_files_analyzed(&self) {
        self.files_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_results_written(&self) {
        self.results_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_analysis_errors(&self) {
        self.analysis_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_inputs_deleted(&self) {
        self.inputs_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_cleanup_passes(&self) {
        self.cleanup_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_pipeline_changes(&self) {
        self.pipeline_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_analyzed: self.files_analyzed.load(Ordering::Relaxed),
            results_written: self.results_written.load(Ordering::Relaxed),
            analysis_errors: self.analysis_errors.load(Ordering::Relaxed),
            inputs_deleted: self.inputs_deleted.load(Ordering::Relaxed),
            cleanup_passes: self.cleanup_passes.load(Ordering::Relaxed),
            pipeline_changes: self.pipeline_changes.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            target: "nightjar::telemetry",
            files_seen = s.files_seen,
            files_analyzed = s.files_analyzed,
            results_written = s.results_written,
            analysis_errors = s.analysis_errors,
            inputs_deleted = s.inputs_deleted,
            cleanup_passes = s.cleanup_passes,
            pipeline_changes = s.pipeline_changes,
            "watcher metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let metrics = WatcherMetrics::default();
        let cloned = metrics.clone();
        metrics.incr_files_seen();
        cloned.incr_files_seen();
        cloned.incr_results_written();
        let s = metrics.snapshot();
        assert_eq!(s.files_seen, 2);
        assert_eq!(s.results_written, 1);
        assert_eq!(s.analysis_errors, 0);
    }
}
