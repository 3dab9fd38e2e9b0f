//! Structured error types shared across Loopai crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`LoopError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (task keys, versions, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the Loopai runtime.
///
/// The first seven families describe per-execution and caller-contract
/// failures; the remaining ones cover storage, encoding and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum LoopError {
    /// Program source could not be prepared.
    #[error("compilation error: {0}")]
    Compilation(ErrorInfo),
    /// Program attempted an operation or import outside the allow-list.
    #[error("restricted capability: {0}")]
    Capability(ErrorInfo),
    /// Program raised while executing.
    #[error("runtime error: {0}")]
    Runtime(ErrorInfo),
    /// Program exceeded its wall-clock bound.
    #[error("timeout: {0}")]
    Timeout(ErrorInfo),
    /// Prepared program does not define the required entry point.
    #[error("missing entry point: {0}")]
    EntryPoint(ErrorInfo),
    /// Requested artifact version or active pointer does not resolve.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// Requested comparison method or strategy is not implemented.
    #[error("unsupported: {0}")]
    Unsupported(ErrorInfo),
    /// Argument or model validation failures.
    #[error("invalid: {0}")]
    Invalid(ErrorInfo),
    /// Filesystem errors.
    #[error("storage error: {0}")]
    Storage(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Deployment configuration errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Failures reported by the oracle collaborator.
    #[error("oracle error: {0}")]
    Oracle(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl LoopError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            LoopError::Compilation(info)
            | LoopError::Capability(info)
            | LoopError::Runtime(info)
            | LoopError::Timeout(info)
            | LoopError::EntryPoint(info)
            | LoopError::NotFound(info)
            | LoopError::Unsupported(info)
            | LoopError::Invalid(info)
            | LoopError::Storage(info)
            | LoopError::Serde(info)
            | LoopError::Config(info)
            | LoopError::Oracle(info) => info,
        }
    }

    /// Mutable access to the payload, for layers that add context.
    pub fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            LoopError::Compilation(info)
            | LoopError::Capability(info)
            | LoopError::Runtime(info)
            | LoopError::Timeout(info)
            | LoopError::EntryPoint(info)
            | LoopError::NotFound(info)
            | LoopError::Unsupported(info)
            | LoopError::Invalid(info)
            | LoopError::Storage(info)
            | LoopError::Serde(info)
            | LoopError::Config(info)
            | LoopError::Oracle(info) => info,
        }
    }

    /// Short lowercase name of the error family.
    pub fn family(&self) -> &'static str {
        match self {
            LoopError::Compilation(_) => "compilation",
            LoopError::Capability(_) => "capability",
            LoopError::Runtime(_) => "runtime",
            LoopError::Timeout(_) => "timeout",
            LoopError::EntryPoint(_) => "entry_point",
            LoopError::NotFound(_) => "not_found",
            LoopError::Unsupported(_) => "unsupported",
            LoopError::Invalid(_) => "invalid",
            LoopError::Storage(_) => "storage",
            LoopError::Serde(_) => "serde",
            LoopError::Config(_) => "config",
            LoopError::Oracle(_) => "oracle",
        }
    }

    /// Whether this error belongs to the per-execution families that the
    /// executor converts into terminal records.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            LoopError::Compilation(_)
                | LoopError::Capability(_)
                | LoopError::Runtime(_)
                | LoopError::Timeout(_)
                | LoopError::EntryPoint(_)
        )
    }

    /// Convenience constructor for filesystem failures tied to a path.
    pub fn storage(code: &str, err: impl ToString, path: &std::path::Path) -> Self {
        LoopError::Storage(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }
}
