//! End-to-end tests for panic recovery
//!
//! Recovery ends the process, so each scenario re-runs this test binary as a
//! child with `RECOVER_SCENARIO` set and inspects its output and exit status.

use rust_jsonl_logger::{LoggerError, EXIT_STATUS};
use serde_json::Value;
use std::error::Error;
use std::process::Command;

const SCENARIO_ENV: &str = "RECOVER_SCENARIO";

struct ChildRun {
    status: Option<i32>,
    records: Vec<Value>,
    stderr: String,
}

/// Run `test_name` in a child process with the scenario enabled.
///
/// libtest prints its own progress to stdout, sometimes on the same line as
/// the first record, so everything before the first `{` of a line is dropped.
fn run_child(test_name: &str) -> ChildRun {
    let exe = std::env::current_exe().expect("Failed to locate test binary");
    let output = Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(SCENARIO_ENV, "1")
        .output()
        .expect("Failed to run child test process");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let records = stdout
        .lines()
        .filter_map(|line| line.find('{').map(|start| &line[start..]))
        .map(|record| serde_json::from_str(record).expect("Record should be valid JSON"))
        .collect();

    ChildRun {
        status: output.status.code(),
        records,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

fn in_child() -> bool {
    std::env::var_os(SCENARIO_ENV).is_some()
}

fn field_names(record: &Value) -> Vec<&str> {
    let mut names: Vec<&str> = record
        .as_object()
        .expect("Record should be an object")
        .keys()
        .map(String::as_str)
        .collect();
    names.sort_unstable();
    names
}

// ============================================================================
// Child scenarios (no-ops unless RECOVER_SCENARIO is set)
// ============================================================================

#[test]
fn scenario_string_panic() {
    if !in_child() {
        return;
    }
    rust_jsonl_logger::recover(|| {
        rust_jsonl_logger::json("starting");
        panic!("worker {} lost its lease", 3);
    });
}

#[test]
fn scenario_error_panic() {
    if !in_child() {
        return;
    }
    let _guard = rust_jsonl_logger::recover_guard();
    let err: Box<dyn Error + Send + Sync> = "database unreachable".into();
    std::panic::panic_any(err);
}

#[test]
fn scenario_encoder_failure_panic() {
    if !in_child() {
        return;
    }
    rust_jsonl_logger::recover(|| {
        let mut grid = std::collections::HashMap::new();
        grid.insert((1, 2), "tuple keys are not JSON keys");
        rust_jsonl_logger::json(&grid);
    });
}

#[test]
fn scenario_no_panic() {
    if !in_child() {
        return;
    }
    let total = rust_jsonl_logger::recover(|| (1..=4).sum::<i32>());
    assert_eq!(total, 10);
}

#[test]
fn scenario_handled_panic_inside_guard() {
    if !in_child() {
        return;
    }
    let _guard = rust_jsonl_logger::recover_guard();
    let caught = std::panic::catch_unwind(|| panic!("inner handled panic"));
    assert!(caught.is_err());
}

// ============================================================================
// Parent assertions
// ============================================================================

#[test]
fn test_recover_non_error_panic() {
    if in_child() {
        return;
    }
    let run = run_child("scenario_string_panic");

    assert_eq!(run.status, Some(EXIT_STATUS));
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.records[0]["Message"], "starting");

    let panic_record = &run.records[1];
    assert_eq!(field_names(panic_record), vec!["Error", "Stack"]);
    assert_eq!(panic_record["Error"], "worker 3 lost its lease");
    assert!(!panic_record["Stack"].as_str().unwrap_or_default().is_empty());
}

#[test]
fn test_recover_error_panic() {
    if in_child() {
        return;
    }
    let run = run_child("scenario_error_panic");

    assert_eq!(run.status, Some(EXIT_STATUS));
    assert_eq!(run.records.len(), 1);

    let panic_record = &run.records[0];
    assert_eq!(field_names(panic_record), vec!["Error", "Message", "Stack"]);
    assert_eq!(panic_record["Message"], "database unreachable");
    assert_eq!(panic_record["Error"]["Message"], "database unreachable");
    assert!(panic_record["Stack"].is_string());
}

#[test]
fn test_recover_encoder_failure() {
    if in_child() {
        return;
    }
    let run = run_child("scenario_encoder_failure_panic");

    assert_eq!(run.status, Some(EXIT_STATUS));
    assert_eq!(run.records.len(), 1);

    let panic_record = &run.records[0];
    assert_eq!(field_names(panic_record), vec!["Error", "Message", "Stack"]);
    let message = panic_record["Message"].as_str().expect("Message should be a string");
    assert!(message.starts_with("JSON error: "), "unexpected message {:?}", message);
}

#[test]
fn test_recover_without_panic_writes_nothing() {
    if in_child() {
        return;
    }
    let run = run_child("scenario_no_panic");

    assert_eq!(run.status, Some(0));
    assert!(run.records.is_empty());
}

#[test]
fn test_handled_panic_inside_guard_still_reaches_stderr() {
    if in_child() {
        return;
    }
    let run = run_child("scenario_handled_panic_inside_guard");

    assert_eq!(run.status, Some(0));
    assert!(run.records.is_empty());
    assert!(
        run.stderr.contains("inner handled panic"),
        "stderr should carry the default panic report, got {:?}",
        run.stderr
    );
}

#[test]
fn test_recovered_panic_is_also_reported_on_stderr() {
    if in_child() {
        return;
    }
    let run = run_child("scenario_string_panic");

    assert_eq!(run.status, Some(EXIT_STATUS));
    assert!(run.stderr.contains("worker 3 lost its lease"));
}

#[test]
fn test_encoder_failure_payload_is_logger_error() {
    if in_child() {
        return;
    }
    let output = rust_jsonl_logger::Output::from_writer(std::io::sink());
    let mut grid = std::collections::HashMap::new();
    grid.insert((0, 0), 0);

    let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| output.json(&grid)))
        .expect_err("Encoding tuple keys should panic");
    assert!(payload.downcast_ref::<LoggerError>().is_some());
}
