//! Concurrency tests for the intervals binary.
//!
//! These tests verify that multiple processes can safely:
//! - Append to the session history simultaneously (file locking)
//! - Read the history while other runs are writing

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn cli(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("intervals"));
    cmd.env("XDG_CONFIG_HOME", home.join("config"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn quick_workout(dir: &Path) -> PathBuf {
    let path = dir.join("quick.md");
    std::fs::write(&path, "# Quick\n## Jacks - 0:02\nRest - 0:01\n## Squats - 8 reps\n")
        .expect("Failed to write workout");
    path
}

fn run_once(home: &Path, file: &Path, data_dir: &Path) {
    cli(home)
        .arg("run")
        .arg(file)
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--autostart")
        .arg("--auto-reps")
        .arg("--tick-ms")
        .arg("1")
        .assert()
        .success();
}

#[test]
fn test_concurrent_session_logging() {
    let temp_dir = setup_test_dir();
    let home = temp_dir.path().to_path_buf();
    let data_dir = home.join("data");
    let file = quick_workout(&home);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let home = home.clone();
            let data_dir = data_dir.clone();
            let file = file.clone();
            thread::spawn(move || run_once(&home, &file, &data_dir))
        })
        .collect();

    for handle in handles {
        handle.join().expect("run thread panicked");
    }

    let log = std::fs::read_to_string(data_dir.join("sessions.jsonl")).expect("Failed to read log");
    let records: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a whole record"))
        .collect();

    assert_eq!(records.len(), 5, "Expected 5 sessions, got {}", records.len());
    assert!(records.iter().all(|r| r["outcome"] == "completed"));
}

#[test]
fn test_concurrent_reads_and_writes() {
    let temp_dir = setup_test_dir();
    let home = temp_dir.path().to_path_buf();
    let data_dir = home.join("data");
    let file = quick_workout(&home);

    run_once(&home, &file, &data_dir);

    let writers: Vec<_> = (0..3)
        .map(|_| {
            let home = home.clone();
            let data_dir = data_dir.clone();
            let file = file.clone();
            thread::spawn(move || run_once(&home, &file, &data_dir))
        })
        .collect();

    // Readers can read at any time
    for _ in 0..3 {
        cli(&home)
            .arg("history")
            .arg("--data-dir")
            .arg(&data_dir)
            .assert()
            .success();
    }

    for writer in writers {
        writer.join().expect("writer thread panicked");
    }

    let log = std::fs::read_to_string(data_dir.join("sessions.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 4);
}
