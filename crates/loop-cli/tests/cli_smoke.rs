use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

const FILTER: &str = r#"
fn classify(text) {
    let words = split(lower(text), " ")
    if "buy" in words or "free" in words { return "spam" }
    return "ham"
}
"#;

fn loopai(data: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_loopai"))
        .arg("--data-dir")
        .arg(data)
        .args(args)
        .env_remove("LOOPAI_CONFIG")
        .env_remove("LOOPAI_TASK_ID")
        .output()
        .expect("run loopai")
}

fn json_stdout(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

#[test]
fn store_activate_and_serve() {
    let data = tempdir().expect("data dir");
    let source = data.path().join("filter.loop");
    fs::write(&source, FILTER).expect("source");
    let source = source.to_str().expect("utf8 path");

    let stored = json_stdout(&loopai(
        data.path(),
        &["artifact", "--task", "spam", "store", source, "--activate"],
    ));
    assert_eq!(stored["version"], 1);
    assert_eq!(stored["status"], "active");

    let served = json_stdout(&loopai(
        data.path(),
        &["exec", "--task", "spam", "--text", "Buy now"],
    ));
    assert_eq!(served["output"], "spam");

    let health = json_stdout(&loopai(data.path(), &["health", "--task", "spam"]));
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["active_version"], 1);

    let metrics = json_stdout(&loopai(data.path(), &["metrics", "--task", "spam"]));
    assert_eq!(metrics["executions_today"], 1);

    let listed = json_stdout(&loopai(data.path(), &["artifact", "--task", "spam", "list"]));
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["active"], true);
}

#[test]
fn exec_without_active_artifact_fails() {
    let data = tempdir().expect("data dir");
    let output = loopai(data.path(), &["exec", "--task", "spam", "--text", "hi"]);
    assert!(!output.status.success());
}

#[test]
fn validate_against_replay_fixture() {
    let data = tempdir().expect("data dir");
    let source = data.path().join("filter.loop");
    fs::write(&source, FILTER).expect("source");
    json_stdout(&loopai(
        data.path(),
        &["artifact", "--task", "spam", "store", source.to_str().expect("path"), "--activate"],
    ));
    for text in ["buy now", "hello there", "cheap watches"] {
        json_stdout(&loopai(data.path(), &["exec", "--task", "spam", "--text", text]));
    }
    let fixture = data.path().join("oracle.json");
    fs::write(
        &fixture,
        r#"{"buy now": "spam", "hello there": "ham", "cheap watches": "spam"}"#,
    )
    .expect("fixture");

    let report = json_stdout(&loopai(
        data.path(),
        &[
            "validate",
            "--task",
            "spam",
            "--oracle",
            fixture.to_str().expect("path"),
            "--rate",
            "1.0",
            "--seed",
            "7",
        ],
    ));
    assert_eq!(report["validated"], 3);
    assert_eq!(report["matched"], 2);

    let summary = json_stdout(&loopai(
        data.path(),
        &["analytics", "--task", "spam", "--validations"],
    ));
    assert_eq!(summary["validated"], 3);

    let daily = json_stdout(&loopai(data.path(), &["analytics", "--task", "spam"]));
    assert_eq!(daily["total_executions"], 3);
}

#[test]
fn version_prints_package_version() {
    let data = tempdir().expect("data dir");
    let output = loopai(data.path(), &["version"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(text.trim(), env!("CARGO_PKG_VERSION"));
}
