use std::fs;

use loop_core::LoopError;
use loop_runtime::{DeploymentConfig, RuntimeMode};
use loop_validate::SamplingKind;
use tempfile::tempdir;

#[test]
fn minimal_config_takes_defaults() {
    let config = DeploymentConfig::from_yaml("runtime:\n  mode: edge\n  data_dir: /tmp/loopai\n")
        .expect("parse");
    assert_eq!(config.runtime.mode, RuntimeMode::Edge);
    assert_eq!(config.execution.worker_count, 4);
    assert_eq!(config.execution.timeout_ms, 1000);
    assert_eq!(config.sampling.strategy, SamplingKind::Random);
    assert_eq!(config.sampling.rate, 0.05);
    assert_eq!(config.storage.retention_days, 7);
    assert_eq!(config.sandbox_caps().wall_ms, 1000);
    assert!(config.allow_list().allows_module("re"));
}

#[test]
fn environment_references_are_substituted() {
    std::env::set_var("LOOPAI_TEST_CFG_DIR", "/srv/loopai-data");
    std::env::set_var("LOOPAI_TEST_CFG_TIMEOUT", "250");
    let yaml = r#"
runtime:
  mode: central
  data_dir: ${LOOPAI_TEST_CFG_DIR}
execution:
  timeout_ms: ${LOOPAI_TEST_CFG_TIMEOUT}
sampling:
  rate: 0.2
  seed: 11
sandbox:
  max_steps: 1000
  max_value_depth: 16
allow_list:
  builtins: [lower, contains]
  modules: []
"#;
    let config = DeploymentConfig::from_yaml(yaml).expect("parse");
    assert_eq!(config.runtime.mode, RuntimeMode::Central);
    assert_eq!(config.runtime.data_dir.to_str(), Some("/srv/loopai-data"));
    assert_eq!(config.execution.timeout_ms, 250);
    let caps = config.sandbox_caps();
    assert_eq!(caps.wall_ms, 250);
    assert_eq!(caps.max_steps, 1000);
    assert_eq!(caps.max_value_depth, 16);
    assert_eq!(caps.max_string_len, 1_000_000);
    let allow = config.allow_list();
    assert!(allow.allows_builtin("lower"));
    assert!(!allow.allows_builtin("print"));
    assert!(!allow.allows_module("re"));
    let sampler = config.sampler().expect("sampler");
    assert_eq!(sampler.seed(), Some(11));
}

#[test]
fn unset_references_are_left_verbatim() {
    let yaml = "runtime:\n  mode: edge\n  data_dir: ${LOOPAI_TEST_CFG_SURELY_UNSET}/data\n";
    let config = DeploymentConfig::from_yaml(yaml).expect("parse");
    assert_eq!(
        config.runtime.data_dir.to_str(),
        Some("${LOOPAI_TEST_CFG_SURELY_UNSET}/data")
    );
}

#[test]
fn out_of_range_values_name_the_field() {
    let cases = [
        ("execution:\n  worker_count: 0\n", "execution.worker_count"),
        ("execution:\n  timeout_ms: 0\n", "execution.timeout_ms"),
        ("sampling:\n  rate: 1.5\n", "sampling.rate"),
        ("storage:\n  retention_days: 0\n", "storage.retention_days"),
    ];
    for (section, field) in cases {
        let yaml = format!("runtime:\n  mode: edge\n  data_dir: /tmp/x\n{section}");
        let err = DeploymentConfig::from_yaml(&yaml).expect_err("invalid");
        assert!(matches!(err, LoopError::Config(_)), "{field}");
        assert_eq!(err.info().context.get("field").map(String::as_str), Some(field));
    }
}

#[test]
fn malformed_and_missing_files_are_config_errors() {
    assert!(matches!(
        DeploymentConfig::from_yaml("runtime:\n  mode: orbit\n  data_dir: /x\n"),
        Err(LoopError::Config(_))
    ));
    assert!(matches!(DeploymentConfig::from_yaml("execution: {}\n"), Err(LoopError::Config(_))));

    let dir = tempdir().expect("dir");
    let missing = dir.path().join("deployment.yaml");
    let err = DeploymentConfig::load(&missing).expect_err("missing");
    assert!(matches!(err, LoopError::Config(_)));
    assert!(err.info().context.contains_key("path"));

    fs::write(&missing, "runtime:\n  mode: hybrid\n  data_dir: /data\n").expect("write");
    assert_eq!(DeploymentConfig::load(&missing).expect("load").runtime.mode, RuntimeMode::Hybrid);
}

#[test]
fn unimplemented_sampling_strategies_are_rejected_when_built() {
    let yaml = "runtime:\n  mode: edge\n  data_dir: /x\nsampling:\n  strategy: uncertainty\n";
    let config = DeploymentConfig::from_yaml(yaml).expect("parse");
    assert!(matches!(config.sampler(), Err(LoopError::Unsupported(_))));
}
