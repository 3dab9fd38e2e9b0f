//! Append-only, date-partitioned JSON Lines logs.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use loop_core::errors::LoopError;
use loop_core::ids::validate_task_key;
use loop_core::record::{ExecutionRecord, ValidationRecord};
use loop_core::serde::to_canonical_json_bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::layout::{parse_execution_file_name, TaskLayout};

/// Days of execution logs kept when no window is configured.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

const DATASETS_DIR: &str = "datasets";

/// Dataset store rooted at `<data>/datasets`.
///
/// Each append serializes one record to a single line and writes it with
/// one `write_all` on an append-mode handle while holding the store's
/// append lock, so concurrent writers never interleave partial lines.
#[derive(Debug)]
pub struct DatasetStore {
    root: PathBuf,
    retention_days: u32,
    append_lock: Mutex<()>,
}

impl DatasetStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join(DATASETS_DIR),
            retention_days: DEFAULT_RETENTION_DAYS,
            append_lock: Mutex::new(()),
        }
    }

    /// Overrides the retention window used by [`DatasetStore::apply_retention`].
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory layout of one task. Rejects unsafe task keys.
    pub fn layout(&self, task_key: &str) -> Result<TaskLayout, LoopError> {
        validate_task_key(task_key)?;
        Ok(TaskLayout::new(self.root.join(task_key)))
    }

    /// Creates the executions, validations and analytics directories.
    pub fn init_task(&self, task_key: &str) -> Result<TaskLayout, LoopError> {
        let layout = self.layout(task_key)?;
        for dir in layout.dirs() {
            fs::create_dir_all(dir).map_err(|err| LoopError::storage("loop_dataset.io", err, dir))?;
        }
        Ok(layout)
    }

    /// Appends one execution to the partition of its `executed_at` date.
    pub fn log_execution(&self, task_key: &str, record: &ExecutionRecord) -> Result<(), LoopError> {
        let layout = self.layout(task_key)?;
        let path = layout.execution_log(record.executed_at.date_naive());
        self.append_line(&path, record)?;
        tracing::debug!(task = task_key, execution = %record.id, status = %record.status, "logged execution");
        Ok(())
    }

    /// Appends one validation to the partition of its `validated_at` date.
    pub fn log_validation(
        &self,
        task_key: &str,
        record: &ValidationRecord,
    ) -> Result<(), LoopError> {
        let layout = self.layout(task_key)?;
        let path = layout.validation_log(record.validated_at.date_naive());
        self.append_line(&path, record)?;
        tracing::debug!(task = task_key, validation = %record.id, matched = record.is_match, "logged validation");
        Ok(())
    }

    /// Executions logged on `date`; empty when the partition does not exist.
    pub fn read(&self, task_key: &str, date: NaiveDate) -> Result<Vec<ExecutionRecord>, LoopError> {
        let layout = self.layout(task_key)?;
        read_lines(&layout.execution_log(date))
    }

    pub fn read_validations(
        &self,
        task_key: &str,
        date: NaiveDate,
    ) -> Result<Vec<ValidationRecord>, LoopError> {
        let layout = self.layout(task_key)?;
        read_lines(&layout.validation_log(date))
    }

    /// Task keys with a directory under the dataset root, sorted.
    pub fn list_tasks(&self) -> Result<Vec<String>, LoopError> {
        let mut tasks = Vec::new();
        if !self.root.exists() {
            return Ok(tasks);
        }
        let entries = fs::read_dir(&self.root)
            .map_err(|err| LoopError::storage("loop_dataset.io", err, &self.root))?;
        for entry in entries {
            let entry = entry.map_err(|err| LoopError::storage("loop_dataset.io", err, &self.root))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_task_key(name).is_ok() {
                    tasks.push(name.to_string());
                }
            }
        }
        tasks.sort();
        Ok(tasks)
    }

    /// Dates with an execution partition, ascending. Other files are ignored.
    pub fn list_execution_dates(&self, task_key: &str) -> Result<Vec<NaiveDate>, LoopError> {
        let layout = self.layout(task_key)?;
        let mut dates = Vec::new();
        if !layout.executions.exists() {
            return Ok(dates);
        }
        let entries = fs::read_dir(&layout.executions)
            .map_err(|err| LoopError::storage("loop_dataset.io", err, &layout.executions))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| LoopError::storage("loop_dataset.io", err, &layout.executions))?;
            if let Some(date) = entry.file_name().to_str().and_then(parse_execution_file_name) {
                dates.push(date);
            }
        }
        dates.sort_unstable();
        Ok(dates)
    }

    fn append_line<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), LoopError> {
        let mut line = to_canonical_json_bytes(record)?;
        line.push(b'\n');
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| LoopError::storage("loop_dataset.io", err, parent))?;
        }
        let _guard = self.append_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| LoopError::storage("loop_dataset.append", err, path))?;
        file.write_all(&line)
            .map_err(|err| LoopError::storage("loop_dataset.append", err, path))
    }
}

/// Reads one JSON Lines partition, skipping blank and unparseable lines.
pub(crate) fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LoopError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(LoopError::storage("loop_dataset.read", err, path)),
    };
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| LoopError::storage("loop_dataset.read", err, path))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(
                path = %path.display(),
                line = idx + 1,
                error = %err,
                "skipping malformed log line"
            ),
        }
    }
    Ok(records)
}
