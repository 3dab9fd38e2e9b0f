//! Task specifications: the immutable description of a classification job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ErrorInfo, LoopError};
use crate::ids::TaskId;

/// One input to output example attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExample {
    /// Open key/value input payload.
    pub input: Map<String, Value>,
    /// Expected label.
    pub output: String,
}

/// Immutable description of a classification job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpecification {
    /// Generated unique identifier.
    pub id: TaskId,
    /// Short task name.
    pub name: String,
    /// Natural-language description forwarded to collaborators.
    pub description: String,
    /// JSON-schema-like description of the input payload.
    pub input_schema: Value,
    /// JSON-schema-like description of the output.
    pub output_schema: Value,
    /// Ordered input to output examples.
    #[serde(default)]
    pub examples: Vec<TaskExample>,
    /// Accuracy target in `[0, 1]`.
    #[serde(default = "default_accuracy_target")]
    pub accuracy_target: f64,
    /// Latency target in milliseconds (positive).
    #[serde(default = "default_latency_target_ms")]
    pub latency_target_ms: u32,
    /// Fraction of successful executions sampled for oracle comparison.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_accuracy_target() -> f64 {
    0.9
}

fn default_latency_target_ms() -> u32 {
    10
}

fn default_sampling_rate() -> f64 {
    0.1
}

impl TaskSpecification {
    /// Creates a task with default targets and a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
    ) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            examples: Vec::new(),
            accuracy_target: default_accuracy_target(),
            latency_target_ms: default_latency_target_ms(),
            sampling_rate: default_sampling_rate(),
            created_at: Utc::now(),
        }
    }

    /// Appends an example pair.
    pub fn with_example(mut self, input: Map<String, Value>, output: impl Into<String>) -> Self {
        self.examples.push(TaskExample {
            input,
            output: output.into(),
        });
        self
    }

    /// Checks the numeric targets against their documented ranges.
    pub fn validate(&self) -> Result<(), LoopError> {
        if self.name.trim().is_empty() {
            return Err(invalid("loop_core.task_name", "task specification missing name"));
        }
        if !(0.0..=1.0).contains(&self.accuracy_target) {
            return Err(invalid(
                "loop_core.task_accuracy",
                format!("accuracy target {} outside [0, 1]", self.accuracy_target),
            ));
        }
        if self.latency_target_ms == 0 {
            return Err(invalid(
                "loop_core.task_latency",
                "latency target must be a positive number of milliseconds",
            ));
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(invalid(
                "loop_core.task_sampling_rate",
                format!("sampling rate {} outside [0, 1]", self.sampling_rate),
            ));
        }
        Ok(())
    }
}

fn invalid(code: &str, message: impl Into<String>) -> LoopError {
    LoopError::Invalid(ErrorInfo::new(code, message))
}
