use chrono::Utc;
use loop_core::{ExecutionStatus, LoopError, ProgramArtifact, TaskId};
use loop_runtime::{DeploymentConfig, Runtime};
use loop_store::ArtifactStore;
use serde_json::{json, Map, Value};
use tempfile::{tempdir, TempDir};

const BUY_FILTER: &str = r#"
fn classify(text) {
    if contains(lower(text), "buy") {
        return "spam"
    }
    return "ham"
}
"#;

const ALWAYS_SPAM: &str = "fn classify(text) { return \"spam\" }";

fn input(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn setup(versions: &[&str], active: Option<u32>) -> (TempDir, DeploymentConfig) {
    let data = tempdir().expect("data dir");
    let store = ArtifactStore::new(data.path());
    let task = TaskId::new();
    for (idx, code) in versions.iter().enumerate() {
        let version = idx as u32 + 1;
        store
            .store("spam", &ProgramArtifact::new(task, version, *code))
            .expect("store");
    }
    if let Some(version) = active {
        store.set_active("spam", version).expect("activate");
    }
    let config = DeploymentConfig::for_data_dir(data.path());
    (data, config)
}

#[test]
fn classifies_spam_and_ham() {
    let (_data, config) = setup(&[BUY_FILTER], Some(1));
    let runtime = Runtime::open(config, "spam").expect("open");
    let (output, latency) = runtime.execute(&input(json!({"text": "Buy now!"}))).expect("spam");
    assert_eq!(output, "spam");
    assert!(latency >= 0.0);
    let (output, _) = runtime
        .execute(&input(json!({"text": "Meeting at 2pm"})))
        .expect("ham");
    assert_eq!(output, "ham");

    let logged = runtime
        .datasets()
        .read("spam", Utc::now().date_naive())
        .expect("read");
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|record| record.status == ExecutionStatus::Success));
}

#[test]
fn missing_active_artifact_fails_open() {
    let (_data, config) = setup(&[BUY_FILTER], None);
    let err = Runtime::open(config, "spam").expect_err("no active");
    assert!(matches!(err, LoopError::NotFound(_)));
    assert_eq!(err.info().code, "loop_runtime.no_active_artifact");
}

#[test]
fn switching_versions_changes_behavior() {
    let (data, config) = setup(&[BUY_FILTER, ALWAYS_SPAM], Some(1));
    let runtime = Runtime::open(config, "spam").expect("open");
    let hello = input(json!({"text": "hello"}));
    assert_eq!(runtime.execute(&hello).expect("v1").0, "ham");
    assert_eq!(runtime.health().active_version, 1);

    let store = ArtifactStore::new(data.path());
    store.set_active("spam", 2).expect("activate v2");
    assert_eq!(runtime.execute(&hello).expect("still v1").0, "ham");
    assert_eq!(runtime.reload().expect("reload"), 2);
    assert_eq!(runtime.execute(&hello).expect("v2").0, "spam");
    assert_eq!(runtime.health().active_version, 2);

    let v1 = store.get("spam", 1).expect("get").expect("v1");
    assert_eq!(v1.code, BUY_FILTER);
    store.verify("spam", 1).expect("v1 untouched");
}

#[test]
fn failed_executions_are_logged_and_surfaced() {
    let (_data, config) = setup(&["fn classify(text) { return missing_name }"], Some(1));
    let runtime = Runtime::open(config, "spam").expect("open");
    let err = runtime
        .execute(&input(json!({"text": "x"})))
        .expect_err("runtime failure");
    assert!(matches!(err, LoopError::Runtime(_)));
    assert!(err.info().context.contains_key("execution_id"));

    let logged = runtime
        .datasets()
        .read("spam", Utc::now().date_naive())
        .expect("read");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, ExecutionStatus::Error);
    assert!(logged[0].output.is_none());
}

#[test]
fn timeouts_surface_as_timeout_errors() {
    let (_data, mut config) = setup(&["fn classify(text) { while true { } }"], Some(1));
    config.execution.timeout_ms = 50;
    config.sandbox.max_steps = Some(u64::MAX);
    let runtime = Runtime::open(config, "spam").expect("open");
    let err = runtime
        .execute(&input(json!({"text": "x"})))
        .expect_err("timeout");
    assert!(matches!(err, LoopError::Timeout(_)));
}

#[test]
fn metrics_count_todays_executions() {
    let (_data, config) = setup(&[BUY_FILTER], Some(1));
    let runtime = Runtime::open(config, "spam").expect("open");
    let empty = runtime.get_metrics().expect("metrics");
    assert_eq!(empty.executions_today, 0);
    assert_eq!(empty.avg_latency_ms, 0.0);

    for text in ["buy", "hi", "buy more"] {
        runtime.execute(&input(json!({ "text": text }))).expect("execute");
    }
    let metrics = runtime.get_metrics().expect("metrics");
    assert_eq!(metrics.executions_today, 3);
    assert!(metrics.avg_latency_ms > 0.0);

    let health = runtime.health();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.task_id, "spam");
}
