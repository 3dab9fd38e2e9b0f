//! Comparison of program outputs with oracle answers.

use chrono::Utc;
use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::ids::ValidationId;
use loop_core::record::{
    ComparisonMethod, ExecutionRecord, FailureKind, FailureTaxonomy, OracleResult,
    ValidationRecord, RESULT_KEY,
};
use serde_json::{Map, Value};

/// Failure category attached to every mismatch.
pub const MISMATCH_CATEGORY: &str = "classification_error";

/// Trims surrounding whitespace and lowercases.
pub fn normalize(output: &str) -> String {
    output.trim().to_lowercase()
}

/// Builds validation records from an execution and an oracle answer.
///
/// Only [`ComparisonMethod::Exact`] is implemented; the other methods are
/// reserved and rejected with [`LoopError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine;

impl ComparisonEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, method: ComparisonMethod) -> bool {
        method == ComparisonMethod::Exact
    }

    pub fn ensure_supported(&self, method: ComparisonMethod) -> Result<(), LoopError> {
        if self.supports(method) {
            return Ok(());
        }
        Err(LoopError::Unsupported(
            ErrorInfo::new(
                "loop_validate.unsupported_method",
                format!("comparison method '{method}' is not implemented"),
            )
            .with_context("method", method.as_str())
            .with_hint("use the `exact` comparison method"),
        ))
    }

    /// Compares the execution's output with the oracle's.
    ///
    /// Tier 1 is set because the program ran, tier 2 has no checks yet and
    /// always passes, tier 3 is the match result.
    pub fn compare(
        &self,
        execution: &ExecutionRecord,
        oracle: &OracleResult,
        method: ComparisonMethod,
    ) -> Result<ValidationRecord, LoopError> {
        self.ensure_supported(method)?;
        let program_output = execution.result_text().unwrap_or_default();
        let (is_match, similarity) = exact_match(&program_output, &oracle.output);
        let failure = (!is_match).then(|| FailureTaxonomy {
            kind: FailureKind::LogicError,
            category: Some(MISMATCH_CATEGORY.to_string()),
            details: format!(
                "Program output '{program_output}' != Oracle output '{}'",
                oracle.output
            ),
        });
        let mut oracle_output = Map::new();
        oracle_output.insert(RESULT_KEY.to_string(), Value::String(oracle.output.clone()));

        Ok(ValidationRecord {
            id: ValidationId::new(),
            execution_id: execution.id,
            program_id: execution.program_id,
            oracle_output,
            oracle_provider: oracle.provider.clone(),
            oracle_model: oracle.model.clone(),
            oracle_cost: oracle.cost,
            oracle_latency_ms: oracle.latency_ms,
            is_match,
            similarity_score: similarity,
            comparison_method: method,
            failure,
            tier1_passed: true,
            tier2_passed: true,
            tier3_passed: is_match,
            validated_at: Utc::now(),
        })
    }
}

fn exact_match(program: &str, oracle: &str) -> (bool, f64) {
    let matched = normalize(program) == normalize(oracle);
    (matched, if matched { 1.0 } else { 0.0 })
}
