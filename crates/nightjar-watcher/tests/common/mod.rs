#![allow(dead_code)] // each test binary uses a different subset

//! Shared fixtures for watcher integration tests.
//!
//! All tests run against the mock pipeline: input files are plain text,
//! `<label-index> <confidence>` per line, so each file's detections are
//! fully determined by its content.

use nightjar_analysis::PipelineRegistry;
use nightjar_watcher::{DeletePolicy, Watcher, WatcherConfig};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub struct Fixture {
    pub root: TempDir,
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub model_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let input_dir = root.path().join("input");
        let output_root = root.path().join("output");
        let model_dir = root.path().join("models");
        std::fs::create_dir_all(&input_dir).unwrap();
        std::fs::create_dir_all(model_dir.join("mock")).unwrap();
        Self {
            root,
            input_dir,
            output_root,
            model_dir,
        }
    }

    pub fn config(&self) -> WatcherConfig {
        WatcherConfig {
            input_dir: self.input_dir.clone(),
            output_root: self.output_root.clone(),
            model_dir: self.model_dir.clone(),
            model_name: "mock".into(),
            pattern: ".wav".into(),
            poll_interval_ms: 100,
            stop_timeout_secs: 5,
            delete_policy: DeletePolicy::Never,
            reanalyze_on_cleanup: true,
            preprocessor: Default::default(),
            model: Default::default(),
            recording: Default::default(),
        }
    }

    pub fn registry(&self) -> PipelineRegistry {
        PipelineRegistry::with_builtins(&self.model_dir)
    }

    pub fn watcher(&self) -> Watcher {
        self.watcher_with(self.config())
    }

    pub fn watcher_with(&self, config: WatcherConfig) -> Watcher {
        Watcher::new(config, self.registry()).unwrap()
    }

    /// Drop a mock recording into the input directory atomically (write
    /// outside the pattern, then rename in), so the watcher never observes
    /// a half-written file.
    pub fn add_recording(&self, name: &str, lines: &str) -> PathBuf {
        let staged = self.input_dir.join(format!("{name}.staging"));
        std::fs::write(&staged, lines).unwrap();
        let path = self.input_dir.join(name);
        std::fs::rename(&staged, &path).unwrap();
        path
    }

    pub fn input_count(&self) -> usize {
        count_matching(&self.input_dir, |name| name.ends_with(".wav"))
    }

    /// Timestamped directories under the output root, sorted.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = match std::fs::read_dir(&self.output_root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        };
        dirs.sort();
        dirs
    }
}

pub fn count_matching(dir: &Path, pred: impl Fn(&str) -> bool) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter(|e| pred(&e.file_name().to_string_lossy()))
            .count(),
        Err(_) => 0,
    }
}

pub fn result_count(output_dir: &Path) -> usize {
    count_matching(output_dir, |name| name.starts_with("results_"))
}

/// Poll until `cond` holds or the timeout expires; returns the final value.
pub fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    cond()
}

pub const INTAKE_TIMEOUT: Duration = Duration::from_secs(10);
