use assert_cmd::Command;
use serde_json::Value;

fn pagepilot() -> Command {
    Command::cargo_bin("pagepilot").expect("binary built")
}

#[test]
fn run_emits_a_completed_json_report() {
    let dir = tempfile::tempdir().expect("tempdir");

    let assert = pagepilot()
        .args([
            "--output",
            "json",
            "run",
            "--tab",
            "1",
            "--task",
            "open https://example.com and click 'Login'",
            "--url",
            "https://example.com",
            "--auto-approve",
            "--store-dir",
        ])
        .arg(dir.path())
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let payload: Value = serde_json::from_str(stdout.trim()).expect("valid JSON report");

    assert_eq!(payload["status"], "completed");
    assert_eq!(payload["task_outcome"]["outcome"], "awaiting_approval");
    assert_eq!(payload["execution_outcome"]["outcome"], "completed");

    let steps = payload["plan"]["steps"].as_array().expect("steps array");
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["action"], "navigate");
    assert_eq!(steps[1]["action"], "click");
    assert_eq!(payload["completed_steps"], 2);

    // The checkpoint is inspectable after the run.
    let inspect = pagepilot()
        .args(["--output", "json", "inspect", "--tab", "1", "--store-dir"])
        .arg(dir.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&inspect.get_output().stdout);
    let session: Value = serde_json::from_str(stdout.trim()).expect("valid session JSON");
    assert_eq!(session["status"], "completed");
    assert_eq!(session["current_plan"]["version"], 1);
}

#[test]
fn unmappable_task_asks_for_clarification() {
    let assert = pagepilot()
        .args([
            "--output",
            "json",
            "run",
            "--task",
            "make it nicer please",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let payload: Value = serde_json::from_str(stdout.trim()).expect("valid JSON report");

    assert_eq!(payload["status"], "awaiting_clarification");
    assert_eq!(payload["task_outcome"]["outcome"], "awaiting_clarification");
    let questions = payload["task_outcome"]["questions"]
        .as_array()
        .expect("questions array");
    assert!(!questions.is_empty());
    assert!(payload["plan"]["summary"].is_null());
}
