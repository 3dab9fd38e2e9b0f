//! Serving path: one task, its active artifact, the executor and the log.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use loop_core::artifact::ProgramArtifact;
use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::record::ExecutionRecord;
use loop_dataset::{DailyAnalytics, DatasetStore};
use loop_host::ProgramExecutor;
use loop_store::ArtifactStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DeploymentConfig;

/// Version reported by [`Runtime::health`].
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub task_id: String,
    pub active_version: u32,
}

/// Cheap projection of today's execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub executions_today: u64,
    pub avg_latency_ms: f64,
}

/// Executes the active artifact of one task and logs every call.
///
/// The active artifact is resolved when the runtime opens and again on
/// [`Runtime::reload`]; sampling and oracle validation never happen on this
/// path.
#[derive(Debug)]
pub struct Runtime {
    task_key: String,
    config: DeploymentConfig,
    artifacts: ArtifactStore,
    datasets: DatasetStore,
    executor: ProgramExecutor,
    active: RwLock<Arc<ProgramArtifact>>,
}

impl Runtime {
    /// Opens the runtime for `task_key`. Fails with `NotFound` when the task
    /// has no active artifact.
    pub fn open(config: DeploymentConfig, task_key: &str) -> Result<Self, LoopError> {
        config.validate()?;
        let data_dir = config.runtime.data_dir.clone();
        let artifacts = ArtifactStore::new(&data_dir);
        let datasets =
            DatasetStore::new(&data_dir).with_retention_days(config.storage.retention_days);
        datasets.init_task(task_key)?;
        let active = resolve_active(&artifacts, task_key)?;
        let executor = ProgramExecutor::with_allow_list(config.sandbox_caps(), config.allow_list());
        tracing::info!(
            task = task_key,
            version = active.version,
            program_id = %active.id,
            data_dir = %data_dir.display(),
            "runtime opened"
        );
        Ok(Self {
            task_key: task_key.to_string(),
            config,
            artifacts,
            datasets,
            executor,
            active: RwLock::new(Arc::new(active)),
        })
    }

    pub fn task_key(&self) -> &str {
        &self.task_key
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn datasets(&self) -> &DatasetStore {
        &self.datasets
    }

    pub fn executor(&self) -> &ProgramExecutor {
        &self.executor
    }

    pub fn active_artifact(&self) -> Arc<ProgramArtifact> {
        Arc::clone(&self.active.read())
    }

    /// Runs the active artifact and logs the record, whatever its status.
    ///
    /// The record's latency is replaced by the wall time of the whole call.
    pub fn execute_record(&self, input: &Map<String, Value>) -> Result<ExecutionRecord, LoopError> {
        let artifact = self.active_artifact();
        let started = Instant::now();
        let mut record = self.executor.execute(&artifact, input, artifact.task_id);
        record.latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.datasets.log_execution(&self.task_key, &record)?;
        Ok(record)
    }

    /// Output and latency of one call. Executions that did not succeed are
    /// logged first and then returned as their `Runtime` or `Timeout` error.
    pub fn execute(&self, input: &Map<String, Value>) -> Result<(String, f64), LoopError> {
        let record = self.execute_record(input)?;
        if let Some(err) = record.to_error() {
            return Err(err);
        }
        Ok((record.result_text().unwrap_or_default(), record.latency_ms))
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            version: RUNTIME_VERSION.to_string(),
            task_id: self.task_key.clone(),
            active_version: self.active.read().version,
        }
    }

    /// Today's execution count and mean latency.
    pub fn get_metrics(&self) -> Result<RuntimeMetrics, LoopError> {
        self.metrics_for(Utc::now().date_naive())
    }

    /// Count and mean latency of one day; the mean skips zero latencies.
    pub fn metrics_for(&self, date: NaiveDate) -> Result<RuntimeMetrics, LoopError> {
        let records = self.datasets.read(&self.task_key, date)?;
        let latencies: Vec<f64> = records
            .iter()
            .map(|record| record.latency_ms)
            .filter(|latency| *latency > 0.0)
            .collect();
        let avg = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };
        Ok(RuntimeMetrics {
            executions_today: records.len() as u64,
            avg_latency_ms: avg,
        })
    }

    /// Re-reads the active pointer and swaps in the artifact it names.
    /// Returns the active version afterwards.
    pub fn reload(&self) -> Result<u32, LoopError> {
        let fresh = resolve_active(&self.artifacts, &self.task_key)?;
        let mut active = self.active.write();
        if active.id != fresh.id || active.version != fresh.version {
            tracing::info!(
                task = %self.task_key,
                from = active.version,
                to = fresh.version,
                "switched active artifact"
            );
            *active = Arc::new(fresh);
        }
        Ok(active.version)
    }

    pub fn daily_analytics(&self, date: NaiveDate) -> Result<DailyAnalytics, LoopError> {
        self.datasets.compute_daily_analytics(&self.task_key, date)
    }

    /// Applies the configured retention window to this task's executions.
    pub fn apply_retention(&self) -> Result<usize, LoopError> {
        self.datasets.apply_retention(&self.task_key)
    }
}

fn resolve_active(artifacts: &ArtifactStore, task_key: &str) -> Result<ProgramArtifact, LoopError> {
    artifacts.get_active(task_key)?.ok_or_else(|| {
        LoopError::NotFound(
            ErrorInfo::new(
                "loop_runtime.no_active_artifact",
                format!("no active artifact for task '{task_key}'"),
            )
            .with_context("task", task_key)
            .with_hint("store a version and activate it with `loopai artifact activate`"),
        )
    })
}
