use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use loop_core::{
    ComparisonMethod, ErrorInfo, ExecutionRecord, LoopError, Oracle, OracleResult, ProgramId,
    TaskId, TaskSpecification,
};
use loop_validate::{RandomSampler, ValidationJob};
use serde_json::{json, Map, Value};

struct TableOracle {
    answers: HashMap<String, String>,
    calls: AtomicUsize,
}

impl Oracle for TableOracle {
    fn query(
        &self,
        _task: &TaskSpecification,
        input: &Map<String, Value>,
    ) -> Result<OracleResult, LoopError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = input.get("text").and_then(Value::as_str).unwrap_or_default();
        match self.answers.get(text) {
            Some(answer) => {
                let mut result = OracleResult::new(answer.clone());
                result.cost = 0.5;
                Ok(result)
            }
            None => Err(LoopError::Oracle(ErrorInfo::new("test.oracle", "no answer"))),
        }
    }
}

fn task() -> TaskSpecification {
    TaskSpecification::new("spam", "flag spam", json!({"text": "string"}), json!({"enum": ["spam", "ham"]}))
}

fn execution(text: &str, output: &str) -> ExecutionRecord {
    let mut input = Map::new();
    input.insert("text".into(), Value::String(text.into()));
    ExecutionRecord::success(ProgramId::new(), TaskId::new(), input, output.into(), 1.0)
}

#[test]
fn validates_every_sample_and_links_records() {
    let mut executions = vec![
        execution("buy now", "spam"),
        execution("meeting at 2pm", "ham"),
        execution("free money", "ham"),
        execution("lunch?", "ham"),
    ];
    let oracle = TableOracle {
        answers: HashMap::from([
            ("buy now".to_string(), "spam".to_string()),
            ("meeting at 2pm".to_string(), "ham".to_string()),
            ("free money".to_string(), "spam".to_string()),
            ("lunch?".to_string(), "HAM".to_string()),
        ]),
        calls: AtomicUsize::new(0),
    };
    let job = ValidationJob::new(RandomSampler::new(1.0, Some(3)).expect("sampler")).with_concurrency(2);
    let outcome = job.run(&task(), &mut executions, &oracle).expect("run");

    assert_eq!(outcome.report.sampled, 4);
    assert_eq!(outcome.report.validated, 4);
    assert_eq!(outcome.report.matched, 3);
    assert_eq!(outcome.report.oracle_failures, 0);
    assert!((outcome.report.agreement_rate - 0.75).abs() < 1e-12);
    assert!((outcome.report.total_oracle_cost - 2.0).abs() < 1e-12);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    for (record, validation) in executions.iter().zip(&outcome.validations) {
        assert!(record.sampled_for_validation);
        assert_eq!(record.validation_id, Some(validation.id));
        assert_eq!(validation.execution_id, record.id);
    }
}

#[test]
fn oracle_failures_are_counted_not_fatal() {
    let mut executions = vec![execution("known", "ham"), execution("unknown", "ham")];
    let oracle = TableOracle {
        answers: HashMap::from([("known".to_string(), "ham".to_string())]),
        calls: AtomicUsize::new(0),
    };
    let job = ValidationJob::new(RandomSampler::new(1.0, Some(5)).expect("sampler"));
    let outcome = job.run(&task(), &mut executions, &oracle).expect("run");
    assert_eq!(outcome.report.validated, 1);
    assert_eq!(outcome.report.oracle_failures, 1);
    assert!(executions[1].sampled_for_validation);
    assert!(executions[1].validation_id.is_none());
    assert!(executions[0].validation_id.is_some());
}

#[test]
fn unsupported_method_fails_before_querying() {
    let mut executions = vec![execution("buy now", "spam")];
    let oracle = TableOracle {
        answers: HashMap::new(),
        calls: AtomicUsize::new(0),
    };
    let job = ValidationJob::new(RandomSampler::new(1.0, Some(5)).expect("sampler"))
        .with_method(ComparisonMethod::Semantic);
    let err = job.run(&task(), &mut executions, &oracle).expect_err("unsupported");
    assert!(matches!(err, LoopError::Unsupported(_)));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    assert!(!executions[0].sampled_for_validation);
}
