//! Program artifacts: one immutable version of a generated program.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, LoopError};
use crate::ids::{ProgramId, TaskId};
use crate::provenance::GenerationProvenance;

/// Language token of programs understood by the shipped sandbox backend.
pub const DEFAULT_LANGUAGE: &str = "loopscript";

macro_rules! string_enum {
    ($(#[$doc:meta])* $name:ident { $($(#[$vdoc:meta])* $variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vdoc])*
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Token used in persisted files and on the command line.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::errors::LoopError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err($crate::errors::LoopError::Invalid(
                        $crate::errors::ErrorInfo::new(
                            "loop_core.unknown_token",
                            format!("unknown {} '{other}'", stringify!($name)),
                        )
                        .with_hint(format!("expected one of: {}", [$($token),+].join(", "))),
                    )),
                }
            }
        }
    };
}

pub(crate) use string_enum;

string_enum!(
    /// How a program was synthesized.
    SynthesisStrategy {
        /// Hand-written style keyword and pattern rules.
        Rule => "rule",
        /// Learned model exported as code.
        Ml => "ml",
        /// Rules combined with a learned fallback.
        Hybrid => "hybrid",
        /// Domain-specific language program.
        Dsl => "dsl",
        /// Strategy chosen by the generator.
        Auto => "auto",
    }
);

string_enum!(
    /// Lifecycle status of a program artifact.
    ProgramStatus {
        /// Generated but not yet validated.
        Draft => "draft",
        /// Passed validation gates.
        Validated => "validated",
        /// Serving live traffic.
        Active => "active",
        /// Replaced by a newer version.
        Deprecated => "deprecated",
        /// Failed validation.
        Failed => "failed",
    }
);

impl Default for SynthesisStrategy {
    fn default() -> Self {
        SynthesisStrategy::Auto
    }
}

impl Default for ProgramStatus {
    fn default() -> Self {
        ProgramStatus::Draft
    }
}

/// Static complexity estimates for a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// Non-blank, non-comment source lines.
    #[serde(default)]
    pub lines_of_code: Option<u32>,
    /// Cyclomatic complexity estimate.
    #[serde(default)]
    pub cyclomatic_complexity: Option<u32>,
    /// Estimated per-call latency in milliseconds.
    #[serde(default)]
    pub estimated_latency_ms: Option<f64>,
}

impl ComplexityMetrics {
    /// True when no metric has been filled in.
    pub fn is_empty(&self) -> bool {
        self.lines_of_code.is_none()
            && self.cyclomatic_complexity.is_none()
            && self.estimated_latency_ms.is_none()
    }
}

/// One version of a generated program for a task.
///
/// Artifacts are immutable once stored: a new version is a new artifact.
/// Which version is active is tracked by the artifact store's pointer, not
/// by [`ProgramArtifact::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramArtifact {
    /// Unique identifier.
    pub id: ProgramId,
    /// Owning task.
    pub task_id: TaskId,
    /// Version number, unique per task and at least 1.
    pub version: u32,
    /// Declared source language.
    #[serde(default = "default_language")]
    pub language: String,
    /// Program source text.
    pub code: String,
    /// Synthesis strategy used by the generator.
    #[serde(default)]
    pub synthesis_strategy: SynthesisStrategy,
    /// Generator confidence in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    /// Static complexity estimates.
    #[serde(default)]
    pub complexity_metrics: ComplexityMetrics,
    /// Generation provenance.
    #[serde(flatten)]
    pub provenance: GenerationProvenance,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ProgramStatus,
    /// Gradual rollout percentage in `[0, 100]`.
    #[serde(default)]
    pub deployment_percentage: f64,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Deployment timestamp, when deployed.
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_confidence() -> f64 {
    0.5
}

impl ProgramArtifact {
    /// Creates a draft `loopscript` artifact with default metadata.
    pub fn new(task_id: TaskId, version: u32, code: impl Into<String>) -> Self {
        Self {
            id: ProgramId::new(),
            task_id,
            version,
            language: default_language(),
            code: code.into(),
            synthesis_strategy: SynthesisStrategy::default(),
            confidence_score: default_confidence(),
            complexity_metrics: ComplexityMetrics::default(),
            provenance: GenerationProvenance::default(),
            status: ProgramStatus::default(),
            deployment_percentage: 0.0,
            created_at: Utc::now(),
            deployed_at: None,
        }
    }

    /// Overrides the declared source language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Overrides the synthesis strategy.
    pub fn with_strategy(mut self, strategy: SynthesisStrategy) -> Self {
        self.synthesis_strategy = strategy;
        self
    }

    /// Overrides the lifecycle status.
    pub fn with_status(mut self, status: ProgramStatus) -> Self {
        self.status = status;
        self
    }

    /// Checks numeric fields against their documented ranges.
    pub fn validate(&self) -> Result<(), LoopError> {
        let fail = |code: &str, message: String| {
            Err(LoopError::Invalid(
                ErrorInfo::new(code, message).with_context("program_id", self.id.to_string()),
            ))
        };
        if self.version < 1 {
            return fail("loop_core.artifact_version", "version must be >= 1".into());
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return fail(
                "loop_core.artifact_confidence",
                format!("confidence {} outside [0, 1]", self.confidence_score),
            );
        }
        if !(0.0..=100.0).contains(&self.deployment_percentage) {
            return fail(
                "loop_core.artifact_deployment",
                format!(
                    "deployment percentage {} outside [0, 100]",
                    self.deployment_percentage
                ),
            );
        }
        if self.provenance.generation_cost < 0.0 || self.provenance.generation_time_sec < 0.0 {
            return fail(
                "loop_core.artifact_provenance",
                "generation cost and time must be non-negative".into(),
            );
        }
        Ok(())
    }
}

/// Code-free projection of a stored artifact's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    /// Artifact identifier.
    pub id: ProgramId,
    /// Owning task.
    pub task_id: TaskId,
    /// Version number.
    pub version: u32,
    /// Declared source language.
    pub language: String,
    /// Synthesis strategy.
    pub synthesis_strategy: SynthesisStrategy,
    /// Lifecycle status.
    pub status: ProgramStatus,
    /// Generator confidence.
    pub confidence_score: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
