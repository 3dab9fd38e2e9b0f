use std::fs;

use chrono::{NaiveDate, TimeZone, Utc};
use loop_core::{
    ComparisonMethod, ExecutionId, ExecutionRecord, LoopError, ProgramId, TaskId, ValidationId,
    ValidationRecord,
};
use loop_dataset::DatasetStore;
use serde_json::{Map, Value};
use tempfile::tempdir;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).expect("date")
}

fn at_noon(mut record: ExecutionRecord) -> ExecutionRecord {
    record.executed_at = Utc.from_utc_datetime(&date().and_hms_opt(12, 0, 0).expect("time"));
    record
}

fn success(latency: f64, sampled: bool) -> ExecutionRecord {
    let mut record = at_noon(ExecutionRecord::success(
        ProgramId::new(),
        TaskId::new(),
        Map::new(),
        "ham".into(),
        latency,
    ));
    record.sampled_for_validation = sampled;
    record
}

fn failure(latency: f64) -> ExecutionRecord {
    let error = LoopError::Runtime(loop_core::ErrorInfo::new("loop_host.runtime", "boom"));
    at_noon(ExecutionRecord::failure(
        ProgramId::new(),
        TaskId::new(),
        Map::new(),
        &error,
        latency,
    ))
}

fn validation(matched: bool, cost: f64, latency: f64) -> ValidationRecord {
    let mut oracle_output = Map::new();
    oracle_output.insert("result".into(), Value::String("ham".into()));
    ValidationRecord {
        id: ValidationId::new(),
        execution_id: ExecutionId::new(),
        program_id: ProgramId::new(),
        oracle_output,
        oracle_provider: "replay".into(),
        oracle_model: "fixture".into(),
        oracle_cost: cost,
        oracle_latency_ms: latency,
        is_match: matched,
        similarity_score: if matched { 1.0 } else { 0.0 },
        comparison_method: ComparisonMethod::Exact,
        failure: None,
        tier1_passed: true,
        tier2_passed: true,
        tier3_passed: matched,
        validated_at: Utc.from_utc_datetime(&date().and_hms_opt(13, 0, 0).expect("time")),
    }
}

#[test]
fn empty_day_reports_zeroes() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    let analytics = store.compute_daily_analytics("spam", date()).expect("analytics");
    assert_eq!(analytics.total_executions, 0);
    assert_eq!(analytics.success_rate, 0.0);
    assert_eq!(analytics.p99_latency_ms, 0.0);
    assert_eq!(analytics.date, date());
}

#[test]
fn aggregates_follow_the_log() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    for (latency, sampled) in [(4.0, true), (1.0, false), (3.0, false), (2.0, true)] {
        store.log_execution("spam", &success(latency, sampled)).expect("log");
    }
    store.log_execution("spam", &failure(100.0)).expect("log");

    let analytics = store.compute_daily_analytics("spam", date()).expect("analytics");
    assert_eq!(analytics.total_executions, 5);
    assert_eq!(analytics.successful_executions, 4);
    assert_eq!(analytics.failed_executions, 1);
    assert!((analytics.success_rate - 0.8).abs() < 1e-12);
    assert_eq!(analytics.sampled_count, 2);
    assert!((analytics.sampling_rate - 0.4).abs() < 1e-12);
    assert!((analytics.avg_latency_ms - 2.5).abs() < 1e-12);
    assert_eq!(analytics.p50_latency_ms, 3.0);
    assert_eq!(analytics.p99_latency_ms, 4.0);

    let again = store.compute_daily_analytics("spam", date()).expect("again");
    assert_eq!(again, analytics);
    let cached = store
        .load_cached_analytics("spam", date())
        .expect("cached")
        .expect("present");
    assert_eq!(cached, analytics);
}

#[test]
fn cache_is_rebuilt_from_the_log() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    store.log_execution("spam", &success(5.0, false)).expect("log");
    store.compute_daily_analytics("spam", date()).expect("analytics");
    let cache = data.path().join("datasets/spam/analytics/daily-stats-2024-06-10.json");
    fs::write(&cache, b"{}").expect("clobber");
    let rebuilt = store.compute_daily_analytics("spam", date()).expect("rebuild");
    assert_eq!(rebuilt.total_executions, 1);
    assert_eq!(store.load_cached_analytics("spam", date()).expect("cached"), Some(rebuilt));
}

#[test]
fn validation_summary_counts_agreement() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    let empty = store.validation_summary("spam", date()).expect("empty");
    assert_eq!(empty.validated, 0);
    assert_eq!(empty.agreement_rate, 0.0);

    for (matched, cost, latency) in [(true, 0.01, 100.0), (true, 0.01, 200.0), (false, 0.02, 300.0)] {
        store.log_validation("spam", &validation(matched, cost, latency)).expect("log");
    }
    let summary = store.validation_summary("spam", date()).expect("summary");
    assert_eq!(summary.validated, 3);
    assert_eq!(summary.matched, 2);
    assert!((summary.agreement_rate - 2.0 / 3.0).abs() < 1e-12);
    assert!((summary.total_oracle_cost - 0.04).abs() < 1e-12);
    assert!((summary.avg_oracle_latency_ms - 200.0).abs() < 1e-12);
    assert_eq!(store.read_validations("spam", date()).expect("read").len(), 3);
}
