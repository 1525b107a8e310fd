//! Watcher lifecycle: start/stop/pause/resume/restart contracts.

mod common;

use common::{result_count, Fixture};
use nightjar_foundation::RunState;
use nightjar_watcher::WatcherError;

#[test]
fn start_stop_round_trip_leaves_one_config_and_no_results() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    watcher.start().unwrap();
    assert!(watcher.is_running());
    watcher.stop().unwrap();
    assert!(watcher.is_stopped());

    let dirs = fx.output_dirs();
    assert_eq!(dirs.len(), 1, "exactly one result directory");
    let entries: Vec<String> = std::fs::read_dir(&dirs[0])
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["config.toml".to_string()]);
    assert_eq!(result_count(&dirs[0]), 0);
}

#[test]
fn start_while_running_demands_explicit_stop() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    watcher.start().unwrap();
    assert!(matches!(
        watcher.start(),
        Err(WatcherError::AlreadyRunning)
    ));

    watcher.pause().unwrap();
    assert!(matches!(
        watcher.start(),
        Err(WatcherError::AlreadyRunning)
    ));

    watcher.stop().unwrap();
    watcher.start().unwrap();
    watcher.stop().unwrap();
}

#[test]
fn lifecycle_calls_without_a_worker_are_rejected() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    assert!(matches!(
        watcher.stop(),
        Err(WatcherError::NotRunning { operation: "stop" })
    ));
    assert!(matches!(
        watcher.pause(),
        Err(WatcherError::NotRunning { operation: "pause" })
    ));
    assert!(matches!(
        watcher.resume(),
        Err(WatcherError::NotRunning { operation: "resume" })
    ));
}

#[test]
fn pause_resume_cycle() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    watcher.start().unwrap();
    watcher.pause().unwrap();
    assert!(watcher.is_paused());

    // Pausing a paused watcher is an invalid transition, not a no-op.
    assert!(watcher.pause().is_err());

    watcher.resume().unwrap();
    assert!(watcher.is_running());
    watcher.stop().unwrap();
}

#[test]
fn exactly_one_state_holds_at_every_step() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    let assert_exclusive = |watcher: &nightjar_watcher::Watcher, expected: RunState| {
        assert_eq!(watcher.state(), expected);
        let flags = [
            watcher.is_stopped(),
            watcher.is_running(),
            watcher.is_paused(),
        ];
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    };

    assert_exclusive(&watcher, RunState::Stopped);
    watcher.start().unwrap();
    assert_exclusive(&watcher, RunState::Running);
    watcher.pause().unwrap();
    assert_exclusive(&watcher, RunState::Paused);
    watcher.resume().unwrap();
    assert_exclusive(&watcher, RunState::Running);
    watcher.stop().unwrap();
    assert_exclusive(&watcher, RunState::Stopped);
}

#[test]
fn restart_keeps_config_and_opens_a_fresh_output_dir() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    watcher.start().unwrap();
    let first = watcher.output_dir().unwrap().to_path_buf();

    watcher.restart().unwrap();
    assert!(watcher.is_running());
    let second = watcher.output_dir().unwrap().to_path_buf();
    assert_ne!(first, second);
    assert_eq!(fx.output_dirs().len(), 2);
    assert!(first.join("config.toml").is_file(), "old snapshot retained");

    watcher.stop().unwrap();
}

#[test]
fn restart_without_a_worker_propagates_the_stop_error() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();

    assert!(matches!(
        watcher.restart(),
        Err(WatcherError::NotRunning { operation: "stop" })
    ));
    assert!(watcher.is_stopped());
    assert!(fx.output_dirs().is_empty(), "failed restart takes no side effects");
}

#[test]
fn unknown_model_is_rejected_at_construction() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.model_name = "does-not-exist".into();
    assert!(nightjar_watcher::Watcher::new(config, fx.registry()).is_err());
}

#[test]
fn partial_location_triple_is_rejected_at_construction() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.recording.latitude = Some(52.5);
    assert!(nightjar_watcher::Watcher::new(config, fx.registry()).is_err());
}
