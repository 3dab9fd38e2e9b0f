//! Seams to the external collaborators: the reference oracle and the
//! program generator. Both are implemented outside this workspace; tests
//! and the CLI plug in fixture-backed versions.

use serde_json::{Map, Value};

use crate::artifact::ProgramArtifact;
use crate::errors::LoopError;
use crate::record::OracleResult;
use crate::task::TaskSpecification;

/// Reference model queried for the "correct" output of sampled inputs.
pub trait Oracle: Send + Sync {
    /// Returns the oracle's answer for `input` under `task`.
    fn query(
        &self,
        task: &TaskSpecification,
        input: &Map<String, Value>,
    ) -> Result<OracleResult, LoopError>;
}

/// Synthesizes program artifacts from a task description.
pub trait ProgramGenerator: Send + Sync {
    /// Produces a new artifact for `task`. The returned version is advisory;
    /// callers storing the artifact may renumber it.
    fn generate(&self, task: &TaskSpecification) -> Result<ProgramArtifact, LoopError>;
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn query(
        &self,
        task: &TaskSpecification,
        input: &Map<String, Value>,
    ) -> Result<OracleResult, LoopError> {
        (**self).query(task, input)
    }
}
