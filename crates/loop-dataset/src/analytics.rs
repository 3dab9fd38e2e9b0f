//! Daily aggregates derived from the execution and validation logs.
//!
//! Aggregates are always recomputed from the raw log; the persisted
//! `daily-stats-<date>.json` file is a cache for audit and dashboards.

use std::fs;

use chrono::NaiveDate;
use loop_core::errors::LoopError;
use loop_core::serde::{from_json_slice, to_canonical_json_pretty};
use serde::{Deserialize, Serialize};

use crate::log::DatasetStore;

/// One day of execution statistics for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    pub total_executions: u64,
    pub successful_executions: u64,
    /// Errors and timeouts.
    pub failed_executions: u64,
    pub success_rate: f64,
    pub sampled_count: u64,
    pub sampling_rate: f64,
    /// Latency statistics cover successful executions only.
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p99_latency_ms: f64,
}

impl DailyAnalytics {
    /// All-zero aggregate for a day without executions.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            success_rate: 0.0,
            sampled_count: 0,
            sampling_rate: 0.0,
            avg_latency_ms: 0.0,
            p50_latency_ms: 0.0,
            p99_latency_ms: 0.0,
        }
    }
}

/// Element at index `floor(len * p)` of an ascending slice, clamped to
/// the last element. Zero for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Oracle agreement over one day of validations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub date: NaiveDate,
    pub validated: u64,
    pub matched: u64,
    pub agreement_rate: f64,
    pub total_oracle_cost: f64,
    pub avg_oracle_latency_ms: f64,
}

impl DatasetStore {
    /// Recomputes the day's aggregate from its execution partition and
    /// refreshes the cached copy under `analytics/`.
    pub fn compute_daily_analytics(
        &self,
        task_key: &str,
        date: NaiveDate,
    ) -> Result<DailyAnalytics, LoopError> {
        let records = self.read(task_key, date)?;
        let analytics = if records.is_empty() {
            DailyAnalytics::empty(date)
        } else {
            let total = records.len() as u64;
            let successful = records.iter().filter(|r| r.is_success()).count() as u64;
            let sampled = records.iter().filter(|r| r.sampled_for_validation).count() as u64;
            let mut latencies: Vec<f64> = records
                .iter()
                .filter(|r| r.is_success())
                .map(|r| r.latency_ms)
                .collect();
            latencies.sort_by(f64::total_cmp);
            let avg = if latencies.is_empty() {
                0.0
            } else {
                latencies.iter().sum::<f64>() / latencies.len() as f64
            };
            DailyAnalytics {
                date,
                total_executions: total,
                successful_executions: successful,
                failed_executions: total - successful,
                success_rate: successful as f64 / total as f64,
                sampled_count: sampled,
                sampling_rate: sampled as f64 / total as f64,
                avg_latency_ms: avg,
                p50_latency_ms: percentile(&latencies, 0.50),
                p99_latency_ms: percentile(&latencies, 0.99),
            }
        };

        let layout = self.layout(task_key)?;
        fs::create_dir_all(&layout.analytics)
            .map_err(|err| LoopError::storage("loop_dataset.io", err, &layout.analytics))?;
        let path = layout.analytics_file(date);
        fs::write(&path, to_canonical_json_pretty(&analytics)?)
            .map_err(|err| LoopError::storage("loop_dataset.analytics_write", err, &path))?;
        tracing::debug!(task = task_key, %date, total = analytics.total_executions, "computed daily analytics");
        Ok(analytics)
    }

    /// The last persisted aggregate for `date`, if any. May be stale.
    pub fn load_cached_analytics(
        &self,
        task_key: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAnalytics>, LoopError> {
        let path = self.layout(task_key)?.analytics_file(date);
        match fs::read(&path) {
            Ok(bytes) => from_json_slice(&bytes).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(LoopError::storage("loop_dataset.read", err, &path)),
        }
    }

    /// Aggregate of the day's validation partition.
    pub fn validation_summary(
        &self,
        task_key: &str,
        date: NaiveDate,
    ) -> Result<ValidationSummary, LoopError> {
        let validations = self.read_validations(task_key, date)?;
        let validated = validations.len() as u64;
        let matched = validations.iter().filter(|v| v.is_match).count() as u64;
        let total_cost: f64 = validations.iter().map(|v| v.oracle_cost).sum();
        let (agreement_rate, avg_latency) = if validated == 0 {
            (0.0, 0.0)
        } else {
            (
                matched as f64 / validated as f64,
                validations.iter().map(|v| v.oracle_latency_ms).sum::<f64>() / validated as f64,
            )
        };
        Ok(ValidationSummary {
            date,
            validated,
            matched,
            agreement_rate,
            total_oracle_cost: total_cost,
            avg_oracle_latency_ms: avg_latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::percentile;

    #[test]
    fn percentile_truncates_index() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert_eq!(percentile(&values, 0.99), 4.0);
        assert_eq!(percentile(&values, 1.0), 4.0);
        assert_eq!(percentile(&[7.0], 0.5), 7.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }
}
