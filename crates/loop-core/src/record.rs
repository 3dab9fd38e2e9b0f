//! Execution and validation records persisted in the dataset logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifact::string_enum;
use crate::errors::{ErrorInfo, LoopError};
use crate::ids::{ExecutionId, ProgramId, TaskId, ValidationId};

/// Key under which program and oracle outputs are stored in payload maps.
pub const RESULT_KEY: &str = "result";

string_enum!(
    /// Terminal outcome of one execution.
    ExecutionStatus {
        /// Program returned a value.
        Success => "success",
        /// Program failed to prepare or raised.
        Error => "error",
        /// Program exceeded its wall-clock bound.
        Timeout => "timeout",
    }
);

string_enum!(
    /// Output comparison method.
    ComparisonMethod {
        /// Equality after normalization.
        Exact => "exact",
        /// Embedding similarity.
        Semantic => "semantic",
        /// Edit-distance style matching.
        Fuzzy => "fuzzy",
        /// Field-wise comparison of structured outputs.
        Structured => "structured",
    }
);

string_enum!(
    /// Validation failure taxonomy.
    FailureKind {
        /// Output malformed.
        SyntaxError => "syntax_error",
        /// Output disagrees with the oracle.
        LogicError => "logic_error",
        /// Disagreement on an input outside the common distribution.
        EdgeCase => "edge_case",
        /// Output correct but too slow.
        Performance => "performance",
    }
);

impl Default for ComparisonMethod {
    fn default() -> Self {
        ComparisonMethod::Exact
    }
}

/// Result of running one program artifact on one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique identifier.
    pub id: ExecutionId,
    /// Program that ran.
    pub program_id: ProgramId,
    /// Task the program belongs to.
    pub task_id: TaskId,
    /// Open key/value input payload.
    pub input: Map<String, Value>,
    /// Output payload (`{"result": ...}`), absent unless the run succeeded.
    #[serde(default)]
    pub output: Option<Map<String, Value>>,
    /// End-to-end latency in milliseconds.
    pub latency_ms: f64,
    /// Peak memory in megabytes, when measured.
    #[serde(default)]
    pub memory_usage_mb: Option<f64>,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Human readable failure message.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Stable code of the captured failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Whether the sampling strategy picked this record.
    #[serde(default)]
    pub sampled_for_validation: bool,
    /// Validation that references this execution, once it exists.
    #[serde(default)]
    pub validation_id: Option<ValidationId>,
    /// Creation timestamp.
    pub executed_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Builds a successful record carrying `{"result": output}`.
    pub fn success(
        program_id: ProgramId,
        task_id: TaskId,
        input: Map<String, Value>,
        output: String,
        latency_ms: f64,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert(RESULT_KEY.to_string(), Value::String(output));
        Self {
            id: ExecutionId::new(),
            program_id,
            task_id,
            input,
            output: Some(payload),
            latency_ms,
            memory_usage_mb: None,
            status: ExecutionStatus::Success,
            error_message: None,
            error_code: None,
            sampled_for_validation: false,
            validation_id: None,
            executed_at: Utc::now(),
        }
    }

    /// Builds a failed record from a captured execution error.
    ///
    /// Timeouts get [`ExecutionStatus::Timeout`]; every other family maps to
    /// [`ExecutionStatus::Error`]. The output is always absent.
    pub fn failure(
        program_id: ProgramId,
        task_id: TaskId,
        input: Map<String, Value>,
        error: &LoopError,
        latency_ms: f64,
    ) -> Self {
        let status = match error {
            LoopError::Timeout(_) => ExecutionStatus::Timeout,
            _ => ExecutionStatus::Error,
        };
        Self {
            id: ExecutionId::new(),
            program_id,
            task_id,
            input,
            output: None,
            latency_ms,
            memory_usage_mb: None,
            status,
            error_message: Some(error.info().message.clone()),
            error_code: Some(error.info().code.clone()),
            sampled_for_validation: false,
            validation_id: None,
            executed_at: Utc::now(),
        }
    }

    /// True when the program returned a value.
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// The stringified program output, when present.
    pub fn result_text(&self) -> Option<String> {
        let value = self.output.as_ref()?.get(RESULT_KEY)?;
        Some(match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }

    /// Flags the record for validation. Returns whether the flag changed.
    pub fn mark_sampled(&mut self) -> bool {
        let changed = !self.sampled_for_validation;
        self.sampled_for_validation = true;
        changed
    }

    /// Reconstructs the caller-facing error of a non-successful record.
    pub fn to_error(&self) -> Option<LoopError> {
        if self.is_success() {
            return None;
        }
        let info = ErrorInfo::new(
            self.error_code
                .clone()
                .unwrap_or_else(|| "loop_core.execution_failed".to_string()),
            self.error_message
                .clone()
                .unwrap_or_else(|| "execution failed".to_string()),
        )
        .with_context("execution_id", self.id.to_string())
        .with_context("program_id", self.program_id.to_string());
        Some(match self.status {
            ExecutionStatus::Timeout => LoopError::Timeout(info),
            _ => LoopError::Runtime(info),
        })
    }
}

/// What the oracle collaborator returned for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleResult {
    /// Raw oracle output.
    pub output: String,
    /// Query cost in USD.
    #[serde(default)]
    pub cost: f64,
    /// Query latency in milliseconds.
    #[serde(default)]
    pub latency_ms: f64,
    /// Provider that answered.
    #[serde(default = "default_oracle_provider")]
    pub provider: String,
    /// Model that answered.
    #[serde(default = "default_oracle_model")]
    pub model: String,
}

fn default_oracle_provider() -> String {
    "openai".to_string()
}

fn default_oracle_model() -> String {
    "gpt-4".to_string()
}

impl OracleResult {
    /// Oracle result with default provenance and zero cost.
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            cost: 0.0,
            latency_ms: 0.0,
            provider: default_oracle_provider(),
            model: default_oracle_model(),
        }
    }
}

/// Failure taxonomy entry attached to mismatching validations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureTaxonomy {
    /// Failure kind.
    pub kind: FailureKind,
    /// Coarse category label.
    #[serde(default)]
    pub category: Option<String>,
    /// Free-text details.
    pub details: String,
}

/// Result of comparing one execution against the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Unique identifier.
    pub id: ValidationId,
    /// Execution that was validated.
    pub execution_id: ExecutionId,
    /// Program that produced the execution.
    pub program_id: ProgramId,
    /// Oracle output payload (`{"result": ...}`).
    pub oracle_output: Map<String, Value>,
    /// Oracle provider.
    pub oracle_provider: String,
    /// Oracle model.
    pub oracle_model: String,
    /// Oracle cost in USD.
    pub oracle_cost: f64,
    /// Oracle latency in milliseconds.
    pub oracle_latency_ms: f64,
    /// Whether the outputs agree.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Similarity score in `[0, 1]`.
    pub similarity_score: f64,
    /// Comparison method used.
    pub comparison_method: ComparisonMethod,
    /// Failure taxonomy entry when mismatched.
    #[serde(default)]
    pub failure: Option<FailureTaxonomy>,
    /// Syntax/compile tier.
    pub tier1_passed: bool,
    /// Unit-test tier.
    pub tier2_passed: bool,
    /// Oracle-agreement tier.
    pub tier3_passed: bool,
    /// Creation timestamp.
    pub validated_at: DateTime<Utc>,
}

impl ValidationRecord {
    /// The stringified oracle output.
    pub fn oracle_text(&self) -> Option<String> {
        self.oracle_output.get(RESULT_KEY).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }
}
