#![deny(missing_docs)]
#![doc = "Core data model, identifiers, error taxonomy and collaborator traits for the Loopai runtime."]

pub mod artifact;
pub mod errors;
pub mod ids;
pub mod oracle;
pub mod provenance;
pub mod record;
pub mod rng;
pub mod serde;
pub mod task;

pub use artifact::{
    ArtifactSummary, ComplexityMetrics, ProgramArtifact, ProgramStatus, SynthesisStrategy,
    DEFAULT_LANGUAGE,
};
pub use errors::{ErrorInfo, LoopError};
pub use ids::{validate_task_key, ExecutionId, ProgramId, TaskId, ValidationId};
pub use oracle::{Oracle, ProgramGenerator};
pub use provenance::{GenerationProvenance, SchemaVersion};
pub use record::{
    ComparisonMethod, ExecutionRecord, ExecutionStatus, FailureKind, FailureTaxonomy,
    OracleResult, ValidationRecord, RESULT_KEY,
};
pub use rng::{derive_substream_seed, RngHandle};
pub use task::{TaskExample, TaskSpecification};
