//! Event-driven intake scenarios.

mod common;

use common::{result_count, wait_for, Fixture, INTAKE_TIMEOUT};
use std::time::Duration;

#[test]
fn five_files_arriving_one_at_a_time_yield_five_results() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();
    watcher.start().unwrap();
    let out = watcher.output_dir().unwrap().to_path_buf();

    for i in 0..5 {
        fx.add_recording(&format!("rec_{i}.wav"), "0 0.9\n");
        std::thread::sleep(Duration::from_millis(150));
    }
    assert!(
        wait_for(|| result_count(&out) == 5, INTAKE_TIMEOUT),
        "expected 5 results, found {}",
        result_count(&out)
    );

    watcher.stop().unwrap();
    assert_eq!(result_count(&out), 5);
    assert!(out.join("config.toml").is_file());
    assert_eq!(fx.output_dirs().len(), 1);
    assert_eq!(fx.input_count(), 5, "policy never leaves inputs in place");
}

#[test]
fn result_rows_are_confidence_filtered() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();
    watcher.start().unwrap();
    let out = watcher.output_dir().unwrap().to_path_buf();

    // robin well above the 0.25 default threshold, sparrow below it
    fx.add_recording("dawn.wav", "0 0.9\n1 0.1\n");
    assert!(wait_for(|| result_count(&out) == 1, INTAKE_TIMEOUT));
    watcher.stop().unwrap();

    let text = std::fs::read_to_string(out.join("results_dawn.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "start,end,label,confidence");
    assert_eq!(lines.len(), 2, "sparrow row filtered out: {text:?}");
    assert_eq!(lines[1], "0.0,3.0,robin,0.9000");
}

#[test]
fn paused_watcher_queues_files_until_resumed() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();
    watcher.start().unwrap();
    let out = watcher.output_dir().unwrap().to_path_buf();

    watcher.pause().unwrap();
    fx.add_recording("one.wav", "0 0.9\n");
    fx.add_recording("two.wav", "1 0.8\n");

    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(result_count(&out), 0, "paused watcher must not analyze");

    watcher.resume().unwrap();
    assert!(
        wait_for(|| result_count(&out) == 2, INTAKE_TIMEOUT),
        "queued files analyzed after resume"
    );
    watcher.stop().unwrap();
}

#[test]
fn non_matching_files_are_ignored() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();
    watcher.start().unwrap();
    let out = watcher.output_dir().unwrap().to_path_buf();

    fx.add_recording("notes.txt", "0 0.9\n");
    fx.add_recording("song.wav", "0 0.9\n");
    assert!(wait_for(|| result_count(&out) == 1, INTAKE_TIMEOUT));
    // Give the txt file a chance to be (wrongly) picked up before asserting.
    std::thread::sleep(Duration::from_millis(300));
    watcher.stop().unwrap();

    assert_eq!(result_count(&out), 1);
    assert!(out.join("results_song.csv").is_file());
}

#[test]
fn worker_errors_reach_the_supervisor_through_the_channel() {
    let fx = Fixture::new();
    let mut watcher = fx.watcher();
    watcher.start().unwrap();

    fx.add_recording("broken.wav", "this is not audio\n");

    let mut errors = Vec::new();
    assert!(
        wait_for(
            || {
                errors.extend(watcher.drain_errors());
                !errors.is_empty()
            },
            INTAKE_TIMEOUT
        ),
        "decode failure must surface via drain_errors"
    );
    watcher.stop().unwrap();

    assert!(errors
        .iter()
        .any(|e| matches!(e, nightjar_watcher::WatcherError::Pipeline(_))));
}
