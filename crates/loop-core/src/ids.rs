//! Opaque identifiers for tasks, programs, executions and validations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ErrorInfo, LoopError};

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(raw: Uuid) -> Self {
                Self(raw)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = LoopError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|err| {
                    LoopError::Invalid(
                        ErrorInfo::new("loop_core.invalid_id", err.to_string())
                            .with_context("kind", stringify!($name))
                            .with_context("value", s),
                    )
                })
            }
        }
    };
}

uuid_id!(
    /// Identifier of a [`crate::TaskSpecification`].
    TaskId
);
uuid_id!(
    /// Identifier of a [`crate::ProgramArtifact`].
    ProgramId
);
uuid_id!(
    /// Identifier of an [`crate::ExecutionRecord`].
    ExecutionId
);
uuid_id!(
    /// Identifier of a [`crate::ValidationRecord`].
    ValidationId
);

/// Checks that `key` can name a per-task directory: non-empty, a single
/// path component, no separators or parent references, not hidden.
pub fn validate_task_key(key: &str) -> Result<(), LoopError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
        || key.contains("..")
        || key.chars().any(char::is_control);
    if bad {
        return Err(LoopError::Invalid(
            ErrorInfo::new(
                "loop_core.task_key",
                format!("'{key}' is not a valid task key"),
            )
            .with_hint("task keys must be a single path component such as 'spam-detector'"),
        ));
    }
    Ok(())
}
