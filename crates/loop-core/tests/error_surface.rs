use loop_core::errors::{ErrorInfo, LoopError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("task", "spam")
        .with_context("version", "2")
}

#[test]
fn execution_families_are_flagged() {
    let err = LoopError::Timeout(sample_info("loop_host.timeout", "deadline exceeded"));
    assert_eq!(err.info().code, "loop_host.timeout");
    assert_eq!(err.family(), "timeout");
    assert!(err.is_execution_failure());

    let err = LoopError::Capability(sample_info("loop_host.capability", "name 'open' is not allowed"));
    assert!(err.is_execution_failure());
    assert!(err.info().context.contains_key("task"));
}

#[test]
fn storage_families_are_not_execution_failures() {
    let err = LoopError::storage(
        "loop_store.read",
        "permission denied",
        std::path::Path::new("/tmp/x"),
    );
    assert_eq!(err.family(), "storage");
    assert!(!err.is_execution_failure());
    assert_eq!(err.info().context.get("path").map(String::as_str), Some("/tmp/x"));
}

#[test]
fn display_includes_context_and_hint() {
    let err = LoopError::NotFound(
        sample_info("loop_store.version_missing", "version 999 not stored")
            .with_hint("run `loopai artifact list`"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("not found: version 999 not stored"));
    assert!(rendered.contains("task=spam"));
    assert!(rendered.contains("hint: run `loopai artifact list`"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = LoopError::Oracle(sample_info("loop_validate.oracle", "rate limited"));
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "Oracle");
    assert_eq!(json["detail"]["code"], "loop_validate.oracle");
}
