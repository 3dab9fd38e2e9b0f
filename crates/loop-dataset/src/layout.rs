//! Directory and file naming for per-task dataset partitions.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

/// Date format used in partition file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const EXECUTIONS_DIR: &str = "executions";
const VALIDATIONS_DIR: &str = "validations";
const ANALYTICS_DIR: &str = "analytics";

/// `2024-03-01.jsonl`
pub fn execution_file_name(date: NaiveDate) -> String {
    format!("{}.jsonl", date.format(DATE_FORMAT))
}

/// `sampled-2024-03-01.jsonl`
pub fn validation_file_name(date: NaiveDate) -> String {
    format!("sampled-{}.jsonl", date.format(DATE_FORMAT))
}

/// `daily-stats-2024-03-01.json`
pub fn analytics_file_name(date: NaiveDate) -> String {
    format!("daily-stats-{}.json", date.format(DATE_FORMAT))
}

/// Parses an execution partition name back into its date.
pub fn parse_execution_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(".jsonl")?;
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}

/// Paths of one task's dataset directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLayout {
    pub root: PathBuf,
    pub executions: PathBuf,
    pub validations: PathBuf,
    pub analytics: PathBuf,
}

impl TaskLayout {
    pub fn new(task_root: impl AsRef<Path>) -> Self {
        let root = task_root.as_ref().to_path_buf();
        Self {
            executions: root.join(EXECUTIONS_DIR),
            validations: root.join(VALIDATIONS_DIR),
            analytics: root.join(ANALYTICS_DIR),
            root,
        }
    }

    pub fn execution_log(&self, date: NaiveDate) -> PathBuf {
        self.executions.join(execution_file_name(date))
    }

    pub fn validation_log(&self, date: NaiveDate) -> PathBuf {
        self.validations.join(validation_file_name(date))
    }

    pub fn analytics_file(&self, date: NaiveDate) -> PathBuf {
        self.analytics.join(analytics_file_name(date))
    }

    pub fn dirs(&self) -> [&Path; 3] {
        [&self.executions, &self.validations, &self.analytics]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        assert_eq!(execution_file_name(date), "2024-03-01.jsonl");
        assert_eq!(validation_file_name(date), "sampled-2024-03-01.jsonl");
        assert_eq!(analytics_file_name(date), "daily-stats-2024-03-01.json");
        assert_eq!(parse_execution_file_name("2024-03-01.jsonl"), Some(date));
        assert_eq!(parse_execution_file_name("2024-3-1.jsonl"), None);
        assert_eq!(parse_execution_file_name("2024-13-01.jsonl"), None);
        assert_eq!(parse_execution_file_name("notes.jsonl"), None);
        assert_eq!(parse_execution_file_name("2024-03-01.json"), None);
    }
}
