//! Provenance descriptors attached to generated program artifacts.

use serde::{Deserialize, Serialize};

/// Where a program came from and what it cost to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProvenance {
    /// LLM provider that synthesized the program.
    pub llm_provider: String,
    /// Model identifier used by the provider.
    pub llm_model: String,
    /// Generation cost in USD.
    #[serde(default)]
    pub generation_cost: f64,
    /// Wall-clock generation time in seconds.
    #[serde(default)]
    pub generation_time_sec: f64,
}

impl Default for GenerationProvenance {
    fn default() -> Self {
        Self {
            llm_provider: "openai".into(),
            llm_model: "gpt-4".into(),
            generation_cost: 0.0,
            generation_time_sec: 0.0,
        }
    }
}

/// Semantic version describing the schema of persisted metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0)
    }
}
