use std::fs;
use std::sync::Arc;
use std::thread;

use chrono::{NaiveDate, TimeZone, Utc};
use loop_core::{ExecutionRecord, LoopError, ProgramId, TaskId};
use loop_dataset::DatasetStore;
use serde_json::{json, Map, Value};
use tempfile::tempdir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).expect("date")
}

fn input(text: &str) -> Map<String, Value> {
    match json!({ "text": text }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn record_on(date: NaiveDate, output: &str) -> ExecutionRecord {
    let mut record =
        ExecutionRecord::success(ProgramId::new(), TaskId::new(), input("hello"), output.into(), 1.5);
    record.executed_at = Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).expect("time"));
    record
}

#[test]
fn init_task_creates_partition_directories() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    store.init_task("spam").expect("init");
    for dir in ["executions", "validations", "analytics"] {
        assert!(data.path().join("datasets/spam").join(dir).is_dir(), "{dir}");
    }
    assert!(matches!(store.init_task("../up"), Err(LoopError::Invalid(_))));
}

#[test]
fn executions_are_partitioned_by_their_date() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    store.log_execution("spam", &record_on(day(1), "ham")).expect("log");
    store.log_execution("spam", &record_on(day(1), "spam")).expect("log");
    store.log_execution("spam", &record_on(day(3), "ham")).expect("log");

    let first = store.read("spam", day(1)).expect("read");
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].result_text().as_deref(), Some("ham"));
    assert_eq!(first[1].result_text().as_deref(), Some("spam"));
    assert_eq!(store.read("spam", day(3)).expect("read").len(), 1);
    assert!(store.read("spam", day(2)).expect("read").is_empty());
    assert_eq!(store.list_execution_dates("spam").expect("dates"), vec![day(1), day(3)]);

    let raw = fs::read_to_string(data.path().join("datasets/spam/executions/2024-05-01.jsonl"))
        .expect("raw");
    assert_eq!(raw.lines().count(), 2);
    assert!(raw.ends_with('\n'));
}

#[test]
fn round_trip_preserves_records() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    let record = record_on(day(4), "spam");
    store.log_execution("spam", &record).expect("log");
    assert_eq!(store.read("spam", day(4)).expect("read"), vec![record]);
}

#[test]
fn blank_and_malformed_lines_are_skipped() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    store.log_execution("spam", &record_on(day(2), "ham")).expect("log");
    let path = data.path().join("datasets/spam/executions/2024-05-02.jsonl");
    let mut raw = fs::read_to_string(&path).expect("raw");
    raw.push_str("\n{not json}\n   \n");
    fs::write(&path, raw).expect("rewrite");
    store.log_execution("spam", &record_on(day(2), "spam")).expect("log");
    assert_eq!(store.read("spam", day(2)).expect("read").len(), 2);
}

#[test]
fn concurrent_appends_keep_lines_whole() {
    let data = tempdir().expect("data dir");
    let store = Arc::new(DatasetStore::new(data.path()));
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..50 {
                    let text = format!("worker-{worker}-{n}-{}", "x".repeat(256));
                    store.log_execution("spam", &record_on(day(9), &text)).expect("log");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }
    let records = store.read("spam", day(9)).expect("read");
    assert_eq!(records.len(), 400);
    let raw = fs::read_to_string(data.path().join("datasets/spam/executions/2024-05-09.jsonl"))
        .expect("raw");
    for line in raw.lines() {
        serde_json::from_str::<Value>(line).expect("whole line");
    }
}

#[test]
fn list_tasks_skips_files_and_unsafe_names() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    assert!(store.list_tasks().expect("empty").is_empty());
    store.init_task("spam").expect("init");
    store.init_task("intent").expect("init");
    fs::create_dir_all(data.path().join("datasets/.hidden")).expect("hidden");
    fs::write(data.path().join("datasets/notes.txt"), "x").expect("file");
    assert_eq!(store.list_tasks().expect("list"), vec!["intent", "spam"]);
}
