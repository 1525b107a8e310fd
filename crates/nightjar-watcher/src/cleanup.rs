//! Reconciliation between the input directory and the current output
//! directory.
//!
//! Every input file either has a result, gains one by synchronous
//! re-analysis, or is recorded in the append-only missing-files ledger.
//! Running it twice with no intervening changes produces no new result
//! files and no duplicate ledger entries.

use crate::config::{DeletePolicy, WatcherConfig};
use crate::error::WatcherError;
use crate::results;
use nightjar_analysis::{PipelineRegistry, Recording};
use nightjar_telemetry::WatcherMetrics;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MISSING_LEDGER: &str = "missing_files.txt";

/// What one reconciliation pass did.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Matching input files considered
    pub scanned: usize,
    /// Gaps repaired by synchronous re-analysis
    pub reanalyzed: Vec<PathBuf>,
    /// Gaps that could not be repaired (or were only recorded)
    pub missing: Vec<PathBuf>,
    /// Inputs deleted under the delete policy
    pub deleted: Vec<PathBuf>,
}

pub(crate) fn reconcile(
    config: &WatcherConfig,
    output_dir: &Path,
    registry: &PipelineRegistry,
    metrics: &WatcherMetrics,
) -> Result<CleanupReport, WatcherError> {
    let inputs = matching_inputs(config)?;
    let mut report = CleanupReport {
        scanned: inputs.len(),
        ..Default::default()
    };

    let gaps: Vec<PathBuf> = inputs
        .iter()
        .filter(|p| !results::has_result(output_dir, p))
        .cloned()
        .collect();

    if config.reanalyze_on_cleanup && !gaps.is_empty() {
        let pipeline = registry.create(&config.model_name, &config.build_config())?;
        let mut recording = Recording::new(pipeline, &config.recording)?;
        for input in &gaps {
            // Deletion is handled below in one policy pass.
            match results::analyze_file(
                &mut recording,
                input,
                output_dir,
                DeletePolicy::Never,
                metrics,
            ) {
                Ok(_) => report.reanalyzed.push(input.clone()),
                Err(e) => {
                    // A permanently unreadable file will never gain a result;
                    // record it instead of aborting the pass.
                    tracing::warn!(
                        target: "nightjar::cleanup",
                        input = %input.display(),
                        error = %e,
                        "re-analysis failed; recording as missing"
                    );
                    report.missing.push(input.clone());
                }
            }
        }
    } else {
        report.missing = gaps;
    }

    append_ledger(output_dir, &report.missing)?;

    if config.delete_policy != DeletePolicy::Never {
        for input in &inputs {
            if !results::has_result(output_dir, input) {
                continue;
            }
            match std::fs::remove_file(input) {
                Ok(()) => {
                    metrics.incr_inputs_deleted();
                    report.deleted.push(input.clone());
                }
                Err(e) => tracing::warn!(
                    target: "nightjar::cleanup",
                    input = %input.display(),
                    error = %e,
                    "failed to delete reconciled input"
                ),
            }
        }
    }

    metrics.incr_cleanup_passes();
    tracing::info!(
        target: "nightjar::cleanup",
        scanned = report.scanned,
        reanalyzed = report.reanalyzed.len(),
        missing = report.missing.len(),
        deleted = report.deleted.len(),
        "reconciliation pass complete"
    );
    Ok(report)
}

/// Matching files in the input directory, sorted for a deterministic pass
/// order.
fn matching_inputs(config: &WatcherConfig) -> Result<Vec<PathBuf>, WatcherError> {
    let entries = std::fs::read_dir(&config.input_dir)
        .map_err(|e| WatcherError::io(&config.input_dir, e))?;
    let mut inputs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WatcherError::io(&config.input_dir, e))?;
        let path = entry.path();
        let matches = path.is_file()
            && path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(&config.pattern))
                .unwrap_or(false);
        if matches {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Append `missing` to the ledger, skipping paths already recorded.
fn append_ledger(output_dir: &Path, missing: &[PathBuf]) -> Result<(), WatcherError> {
    if missing.is_empty() {
        return Ok(());
    }
    let path = output_dir.join(MISSING_LEDGER);
    let known: HashSet<String> = match std::fs::read_to_string(&path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => HashSet::new(),
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| WatcherError::io(&path, e))?;
    for input in missing {
        let line = input.display().to_string();
        if known.contains(&line) {
            continue;
        }
        writeln!(file, "{line}").map_err(|e| WatcherError::io(&path, e))?;
    }
    Ok(())
}

/// Ledger contents, one recorded path per line.
pub fn read_ledger(output_dir: &Path) -> Vec<String> {
    std::fs::read_to_string(output_dir.join(MISSING_LEDGER))
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
