//! Retention of execution partitions.

use std::fs;

use chrono::{Days, NaiveDate, Utc};
use loop_core::errors::LoopError;

use crate::layout::parse_execution_file_name;
use crate::log::DatasetStore;

impl DatasetStore {
    /// Deletes execution partitions that fall outside the retention window
    /// of the last `retention_days` UTC dates, today included. Returns the number of files removed.
    pub fn apply_retention(&self, task_key: &str) -> Result<usize, LoopError> {
        self.apply_retention_at(task_key, Utc::now().date_naive())
    }

    /// Same as [`DatasetStore::apply_retention`] with an explicit "today".
    ///
    /// A partition dated `d` is removed iff `d <= today - retention_days`.
    /// Files whose names are not `YYYY-MM-DD.jsonl` are left alone, and a
    /// file that cannot be removed is logged and skipped.
    pub fn apply_retention_at(&self, task_key: &str, today: NaiveDate) -> Result<usize, LoopError> {
        let layout = self.layout(task_key)?;
        if !layout.executions.exists() {
            return Ok(0);
        }
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(self.retention_days())))
            .unwrap_or(NaiveDate::MIN);
        let entries = fs::read_dir(&layout.executions)
            .map_err(|err| LoopError::storage("loop_dataset.io", err, &layout.executions))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(date) = entry.file_name().to_str().and_then(parse_execution_file_name) else {
                continue;
            };
            if date > cutoff || !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not remove expired partition")
                }
            }
        }
        if removed > 0 {
            tracing::info!(task = task_key, removed, %cutoff, "applied retention");
        }
        Ok(removed)
    }
}
