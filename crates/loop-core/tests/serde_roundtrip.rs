use loop_core::serde::{from_json_slice, from_yaml_str, to_canonical_json_bytes};
use loop_core::{
    ComparisonMethod, ExecutionRecord, ExecutionStatus, LoopError, ProgramArtifact, ProgramId,
    ProgramStatus, TaskId, TaskSpecification,
};
use serde_json::{json, Map, Value};

fn input(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("text".into(), Value::String(text.into()));
    map
}

#[test]
fn artifact_json_flattens_provenance() {
    let artifact = ProgramArtifact::new(TaskId::new(), 1, "fn classify(text) { return \"ham\" }");
    let bytes = to_canonical_json_bytes(&artifact).expect("serialize");
    let value: Value = from_json_slice(&bytes).expect("parse");
    assert_eq!(value["llm_provider"], "openai");
    assert_eq!(value["language"], "loopscript");
    assert_eq!(value["status"], "draft");

    let decoded: ProgramArtifact = from_json_slice(&bytes).expect("deserialize");
    assert_eq!(decoded, artifact);
}

#[test]
fn canonical_bytes_sort_keys() {
    let bytes = to_canonical_json_bytes(&json!({"b": 1, "a": {"d": 2, "c": 3}})).expect("json");
    assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
}

#[test]
fn failure_record_keeps_status_and_hides_output() {
    let err = LoopError::Timeout(loop_core::ErrorInfo::new("loop_host.timeout", "too slow"));
    let record = ExecutionRecord::failure(ProgramId::new(), TaskId::new(), input("x"), &err, 12.0);
    assert_eq!(record.status, ExecutionStatus::Timeout);
    assert!(record.output.is_none());
    assert_eq!(record.error_code.as_deref(), Some("loop_host.timeout"));
    assert!(matches!(record.to_error(), Some(LoopError::Timeout(_))));

    let ok = ExecutionRecord::success(ProgramId::new(), TaskId::new(), input("x"), "spam".into(), 1.5);
    assert_eq!(ok.result_text().as_deref(), Some("spam"));
    assert!(ok.to_error().is_none());
}

#[test]
fn enum_tokens_parse_and_reject() {
    assert_eq!("semantic".parse::<ComparisonMethod>().unwrap(), ComparisonMethod::Semantic);
    assert_eq!(ProgramStatus::Active.to_string(), "active");
    let err = "bogus".parse::<ProgramStatus>().unwrap_err();
    assert_eq!(err.info().code, "loop_core.unknown_token");
}

#[test]
fn task_validation_rejects_out_of_range_targets() {
    let mut task = TaskSpecification::new("spam", "detect spam", json!({}), json!({}));
    assert!(task.validate().is_ok());
    task.accuracy_target = 1.5;
    assert_eq!(task.validate().unwrap_err().info().code, "loop_core.task_accuracy");

    let yaml = "id: 2b1e3f7a-0000-4000-8000-000000000001\nname: t\ndescription: d\ninput_schema: {}\noutput_schema: {}\n";
    let parsed: TaskSpecification = from_yaml_str(yaml).expect("yaml");
    assert_eq!(parsed.latency_target_ms, 10);
    assert!((parsed.sampling_rate - 0.1).abs() < f64::EPSILON);
}

#[test]
fn artifact_validation_checks_ranges() {
    let mut artifact = ProgramArtifact::new(TaskId::new(), 0, "");
    assert_eq!(artifact.validate().unwrap_err().info().code, "loop_core.artifact_version");
    artifact.version = 1;
    artifact.deployment_percentage = 120.0;
    assert!(matches!(artifact.validate(), Err(LoopError::Invalid(_))));
}
