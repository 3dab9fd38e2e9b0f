//! Runtime orchestration for Loopai tasks.
//!
//! [`Runtime`] serves the active artifact of one task and logs every call.
//! Validation against the oracle runs out of band through [`validate_day`].

pub mod config;
pub mod deploy;
pub mod orchestrator;
pub mod validation;

pub use config::{
    substitute_env, DeploymentConfig, ExecutionSection, RuntimeMode, RuntimeSection,
    SamplingSection, SandboxSection, StorageSection,
};
pub use deploy::publish_generated;
pub use orchestrator::{HealthReport, Runtime, RuntimeMetrics, RUNTIME_VERSION};
pub use validation::{day_number, validate_day};
