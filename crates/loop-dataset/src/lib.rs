//! Execution log and analytics store for Loopai tasks.

pub mod analytics;
pub mod export;
pub mod layout;
pub mod log;
pub mod retention;

pub use analytics::{percentile, DailyAnalytics, ValidationSummary};
pub use export::{export_analytics_csv, write_analytics_csv};
pub use layout::{
    analytics_file_name, execution_file_name, parse_execution_file_name, validation_file_name,
    TaskLayout, DATE_FORMAT,
};
pub use log::{DatasetStore, DEFAULT_RETENTION_DAYS};
