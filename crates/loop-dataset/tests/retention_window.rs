use std::fs;

use chrono::NaiveDate;
use loop_dataset::{execution_file_name, DatasetStore};
use tempfile::tempdir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 20).expect("date")
}

#[test]
fn deletes_exactly_the_expired_partitions() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path()).with_retention_days(7);
    let layout = store.init_task("spam").expect("init");

    let expired = [7u64, 8, 9, 30];
    let kept = [0u64, 1, 5, 6];
    for offset in expired.iter().chain(kept.iter()) {
        let date = today() - chrono::Days::new(*offset);
        fs::write(layout.executions.join(execution_file_name(date)), b"{}\n").expect("write");
    }
    for junk in ["notes.txt", "2024-02-30.jsonl", "yesterday.jsonl", "2020-01-01.jsonl.bak"] {
        fs::write(layout.executions.join(junk), b"").expect("junk");
    }
    let validation = layout.validations.join("sampled-2020-01-01.jsonl");
    fs::write(&validation, b"").expect("validation");

    let removed = store.apply_retention_at("spam", today()).expect("retention");
    assert_eq!(removed, expired.len());
    for offset in kept {
        let date = today() - chrono::Days::new(offset);
        assert!(layout.executions.join(execution_file_name(date)).exists(), "{date}");
    }
    for offset in expired {
        let date = today() - chrono::Days::new(offset);
        assert!(!layout.executions.join(execution_file_name(date)).exists(), "{date}");
    }
    assert!(layout.executions.join("notes.txt").exists());
    assert!(layout.executions.join("2024-02-30.jsonl").exists());
    assert!(validation.exists());

    assert_eq!(store.apply_retention_at("spam", today()).expect("again"), 0);
}

#[test]
fn missing_task_has_nothing_to_delete() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path());
    assert_eq!(store.apply_retention("ghost").expect("retention"), 0);
}

#[test]
fn one_day_window_keeps_only_today() {
    let data = tempdir().expect("data dir");
    let store = DatasetStore::new(data.path()).with_retention_days(1);
    let layout = store.init_task("spam").expect("init");
    let yesterday = today() - chrono::Days::new(1);
    for date in [today(), yesterday] {
        fs::write(layout.executions.join(execution_file_name(date)), b"{}\n").expect("write");
    }

    assert_eq!(store.apply_retention_at("spam", today()).expect("retention"), 1);
    assert!(layout.executions.join(execution_file_name(today())).exists());
    assert!(!layout.executions.join(execution_file_name(yesterday)).exists());
}
