//! End-to-end tests for the rtask-demo binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn demo() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("rtask-demo")?;
    cmd.env_remove("RTASK_CONFIG").env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_json_report_lists_every_task() -> TestResult {
    let output = demo()?
        .args([
            "--tasks", "3", "--period-ms", "10", "--duration-ms", "150", "--class", "other",
            "--json",
        ])
        .output()?;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["success"], true);
    let tasks = report["tasks"].as_array().ok_or("tasks is not an array")?;
    assert_eq!(tasks.len(), 3);
    for task in tasks {
        assert!(task["instances"].as_u64().ok_or("instances missing")? > 0);
        assert_eq!(task["core"], 0);
    }
    Ok(())
}

#[test]
fn test_global_policy_leaves_tasks_unpinned() -> TestResult {
    let output = demo()?
        .args([
            "--tasks", "2", "--duration-ms", "50", "--class", "other", "--policy", "global",
            "--json",
        ])
        .output()?;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout)?;
    let tasks = report["tasks"].as_array().ok_or("tasks is not an array")?;
    assert!(tasks.iter().all(|task| task["core"].is_null()));
    Ok(())
}

#[test]
fn test_human_report_has_header() -> TestResult {
    demo()?
        .args(["--tasks", "1", "--duration-ms", "30", "--class", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("instances"))
        .stdout(predicate::str::contains("misses"));
    Ok(())
}

#[test]
fn test_config_file_is_read() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("runtime.json");
    fs::write(
        &path,
        r#"{ "policy": { "class": "other", "multiprocessor": "global", "protocol": "none" }, "capacity": 8 }"#,
    )?;

    let output = demo()?
        .args(["--tasks", "2", "--duration-ms", "30", "--json", "--config"])
        .arg(&path)
        .output()?;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout)?;
    let tasks = report["tasks"].as_array().ok_or("tasks is not an array")?;
    assert!(tasks.iter().all(|task| task["core"].is_null()));
    Ok(())
}

#[test]
fn test_too_many_tasks_for_capacity_fails() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("runtime.json");
    fs::write(&path, r#"{ "capacity": 2 }"#)?;

    demo()?
        .args(["--tasks", "3", "--duration-ms", "10", "--class", "other", "--config"])
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("capacity"));
    Ok(())
}

#[test]
fn test_missing_config_file_fails() -> TestResult {
    demo()?
        .args(["--config", "/nonexistent/rtask.json"])
        .assert()
        .code(3);
    Ok(())
}

#[test]
fn test_zero_tasks_is_rejected() -> TestResult {
    demo()?
        .args(["--tasks", "0", "--class", "other"])
        .assert()
        .code(2);
    Ok(())
}
