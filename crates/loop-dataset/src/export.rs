use std::fs::File;
use std::io::Write;
use std::path::Path;

use loop_core::errors::{ErrorInfo, LoopError};

use crate::analytics::DailyAnalytics;
use crate::layout::DATE_FORMAT;

const HEADER: [&str; 10] = [
    "date",
    "total_executions",
    "successful_executions",
    "failed_executions",
    "success_rate",
    "sampled_count",
    "sampling_rate",
    "avg_latency_ms",
    "p50_latency_ms",
    "p99_latency_ms",
];

/// Writes one CSV row per day, with a header, to `out_path`.
pub fn export_analytics_csv(rows: &[DailyAnalytics], out_path: &Path) -> Result<(), LoopError> {
    let file =
        File::create(out_path).map_err(|err| LoopError::storage("loop_dataset.export", err, out_path))?;
    write_analytics_csv(rows, file).map_err(|mut err| {
        err.info_mut()
            .context
            .insert("path".into(), out_path.display().to_string());
        err
    })
}

pub fn write_analytics_csv<W: Write>(rows: &[DailyAnalytics], writer: W) -> Result<(), LoopError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER).map_err(export_error)?;
    for row in rows {
        wtr.write_record([
            row.date.format(DATE_FORMAT).to_string(),
            row.total_executions.to_string(),
            row.successful_executions.to_string(),
            row.failed_executions.to_string(),
            row.success_rate.to_string(),
            row.sampled_count.to_string(),
            row.sampling_rate.to_string(),
            row.avg_latency_ms.to_string(),
            row.p50_latency_ms.to_string(),
            row.p99_latency_ms.to_string(),
        ])
        .map_err(export_error)?;
    }
    wtr.flush()
        .map_err(|err| LoopError::Storage(ErrorInfo::new("loop_dataset.export", err.to_string())))
}

fn export_error(err: csv::Error) -> LoopError {
    LoopError::Storage(ErrorInfo::new("loop_dataset.export", err.to_string()))
}
