//! Result files: one CSV per analyzed input, named after the input's stem.

use crate::config::DeletePolicy;
use crate::error::WatcherError;
use nightjar_analysis::{Detection, Recording};
use nightjar_telemetry::WatcherMetrics;
use std::path::{Path, PathBuf};

/// `results_<input-file-stem>.csv`
pub fn result_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    format!("results_{stem}.csv")
}

pub fn result_path(output_dir: &Path, input: &Path) -> PathBuf {
    output_dir.join(result_file_name(input))
}

pub fn has_result(output_dir: &Path, input: &Path) -> bool {
    result_path(output_dir, input).is_file()
}

pub fn write_detections(
    output_dir: &Path,
    input: &Path,
    detections: &[Detection],
) -> Result<PathBuf, WatcherError> {
    let path = result_path(output_dir, input);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["start", "end", "label", "confidence"])?;
    for d in detections {
        writer.write_record([
            format!("{:.1}", d.start_s),
            format!("{:.1}", d.end_s),
            d.label.clone(),
            format!("{:.4}", d.confidence),
        ])?;
    }
    writer.flush().map_err(|e| WatcherError::io(&path, e))?;
    Ok(path)
}

/// Run one file through the pipeline and persist its result.
///
/// This is the single analysis path shared by the worker's live intake and
/// the cleanup's synchronous re-analysis: bind, analyze, write the result
/// file, reset the accumulator, and apply the `always` delete policy.
pub(crate) fn analyze_file(
    recording: &mut Recording,
    input: &Path,
    output_dir: &Path,
    delete_policy: DeletePolicy,
    metrics: &WatcherMetrics,
) -> Result<PathBuf, WatcherError> {
    recording.bind(input);
    if let Err(e) = recording.analyze() {
        metrics.incr_analysis_errors();
        recording.reset();
        return Err(e.into());
    }
    let detections = recording.detections();
    let result = write_detections(output_dir, input, &detections)?;
    recording.reset();
    metrics.incr_files_analyzed();
    metrics.incr_results_written();
    tracing::info!(
        target: "nightjar::watcher",
        input = %input.display(),
        detections = detections.len(),
        result = %result.display(),
        "recording analyzed"
    );

    if delete_policy == DeletePolicy::Always {
        match std::fs::remove_file(input) {
            Ok(()) => metrics.incr_inputs_deleted(),
            // The result exists; a later cleanup pass can still delete the input.
            Err(e) => tracing::warn!(
                target: "nightjar::watcher",
                input = %input.display(),
                error = %e,
                "failed to delete analyzed input"
            ),
        }
    }
    Ok(result)
}
