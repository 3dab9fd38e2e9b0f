use std::fs;

use chrono::NaiveDate;
use loop_dataset::{export_analytics_csv, write_analytics_csv, DailyAnalytics};
use tempfile::tempdir;

#[test]
fn csv_has_header_and_one_row_per_day() {
    let first = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
    let mut busy = DailyAnalytics::empty(NaiveDate::from_ymd_opt(2024, 1, 2).expect("date"));
    busy.total_executions = 10;
    busy.successful_executions = 9;
    busy.failed_executions = 1;
    busy.success_rate = 0.9;
    let rows = vec![DailyAnalytics::empty(first), busy];

    let dir = tempdir().expect("dir");
    let path = dir.path().join("analytics.csv");
    export_analytics_csv(&rows, &path).expect("export");
    let text = fs::read_to_string(&path).expect("read");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("date,total_executions,successful_executions"));
    assert!(lines[1].starts_with("2024-01-01,0,0,0,0,"));
    assert!(lines[2].starts_with("2024-01-02,10,9,1,0.9,"));

    let mut buffer = Vec::new();
    write_analytics_csv(&rows, &mut buffer).expect("write");
    assert_eq!(String::from_utf8(buffer).expect("utf8"), text);
}
