//! Deployment configuration loaded from YAML.
//!
//! `${NAME}` references in the file text are replaced by environment
//! variables before parsing; unset variables are left verbatim.

use std::fs;
use std::path::{Path, PathBuf};

use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::serde::from_yaml_str;
use loop_host::{CapabilityAllowList, SandboxCaps};
use loop_validate::{RandomSampler, SamplingKind};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const ENV_REFERENCE: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Where the runtime is deployed. Informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Edge,
    Central,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSection {
    pub mode: RuntimeMode,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub worker_count: u32,
    pub timeout_ms: u64,
    /// Advisory; the in-process sandbox does not meter memory.
    pub max_memory_mb: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            worker_count: 4,
            timeout_ms: 1000,
            max_memory_mb: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSection {
    pub strategy: SamplingKind,
    pub rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            strategy: SamplingKind::Random,
            rate: 0.05,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub retention_days: u32,
    /// Advisory.
    pub max_size_gb: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            retention_days: 7,
            max_size_gb: 100,
        }
    }
}

/// Optional overrides of the default sandbox caps. The wall-clock bound
/// always comes from `execution.timeout_ms`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_call_depth: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collection_len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_string_len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value_depth: Option<u64>,
}

/// Complete deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub sampling: SamplingSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub sandbox: SandboxSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_list: Option<CapabilityAllowList>,
}

impl DeploymentConfig {
    /// Defaults for an edge deployment rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime: RuntimeSection {
                mode: RuntimeMode::Edge,
                data_dir: data_dir.into(),
            },
            execution: ExecutionSection::default(),
            sampling: SamplingSection::default(),
            storage: StorageSection::default(),
            sandbox: SandboxSection::default(),
            allow_list: None,
        }
    }

    /// Reads, substitutes and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoopError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            LoopError::Config(
                ErrorInfo::new("loop_runtime.config_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml(&text).map_err(|mut err| {
            err.info_mut()
                .context
                .insert("path".into(), path.display().to_string());
            err
        })
    }

    /// Parses configuration text after environment substitution.
    pub fn from_yaml(text: &str) -> Result<Self, LoopError> {
        let expanded = substitute_env(text, |name| std::env::var(name).ok())?;
        let config: Self = from_yaml_str(&expanded).map_err(|err| {
            LoopError::Config(
                ErrorInfo::new("loop_runtime.config_parse", err.info().message.clone())
                    .with_hint("check the YAML against the deployment configuration sections"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.runtime.data_dir.as_os_str().is_empty() {
            return Err(config_error("runtime.data_dir", "must not be empty"));
        }
        if self.execution.worker_count == 0 {
            return Err(config_error("execution.worker_count", "must be greater than 0"));
        }
        if self.execution.timeout_ms == 0 {
            return Err(config_error("execution.timeout_ms", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.sampling.rate) {
            return Err(config_error("sampling.rate", "must be between 0.0 and 1.0"));
        }
        if self.storage.retention_days == 0 {
            return Err(config_error("storage.retention_days", "must be greater than 0"));
        }
        if self.storage.max_size_gb == 0 {
            return Err(config_error("storage.max_size_gb", "must be greater than 0"));
        }
        Ok(())
    }

    /// Sandbox caps: defaults, the configured timeout, then overrides.
    pub fn sandbox_caps(&self) -> SandboxCaps {
        let mut caps = SandboxCaps::with_wall_ms(self.execution.timeout_ms);
        let overrides = &self.sandbox;
        if let Some(steps) = overrides.max_steps {
            caps.max_steps = steps;
        }
        if let Some(depth) = overrides.max_call_depth {
            caps.max_call_depth = depth;
        }
        if let Some(len) = overrides.max_collection_len {
            caps.max_collection_len = len;
        }
        if let Some(len) = overrides.max_string_len {
            caps.max_string_len = len;
        }
        if let Some(depth) = overrides.max_value_depth {
            caps.max_value_depth = depth;
        }
        caps
    }

    pub fn allow_list(&self) -> CapabilityAllowList {
        self.allow_list.clone().unwrap_or_default()
    }

    /// Sampler for the configured strategy. Only `random` is implemented.
    pub fn sampler(&self) -> Result<RandomSampler, LoopError> {
        self.sampling
            .strategy
            .build(self.sampling.rate, self.sampling.seed)
    }
}

fn config_error(field: &str, message: &str) -> LoopError {
    LoopError::Config(
        ErrorInfo::new("loop_runtime.config_value", format!("{field} {message}"))
            .with_context("field", field),
    )
}

/// Replaces `${NAME}` with `lookup(NAME)` where it returns a value.
pub fn substitute_env<F>(text: &str, lookup: F) -> Result<String, LoopError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = Regex::new(ENV_REFERENCE).map_err(|err| {
        LoopError::Config(ErrorInfo::new("loop_runtime.env_pattern", err.to_string()))
    })?;
    let expanded = pattern.replace_all(text, |caps: &Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    Ok(expanded.into_owned())
}
