use std::fs;

use carousel_core::{GenerationMode, HistoryEntry, JobHandle, RecencyBucket, Slide};
use carousel_engine::{
    FileStore, HistorySettings, HistoryStore, KeyValueStore, MemoryStore, SaveOutcome,
    StorageError, HISTORY_KEY,
};
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn entry(job: &str, minutes_ago: i64) -> HistoryEntry {
    let at = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap() - Duration::minutes(minutes_ago);
    HistoryEntry {
        id: at.timestamp_millis(),
        prompt_preview: format!("prompt for {job}"),
        slides: vec![Slide::from_url(format!("https://cdn.example/{job}/1.jpg"))],
        creator_name: "none".to_string(),
        template: "Minimalist".to_string(),
        timestamp: at,
        job_id: JobHandle::new(job),
        mode: GenerationMode::Idea,
    }
}

fn stored_entries(store: &MemoryStore) -> Vec<Value> {
    let raw = store.get(HISTORY_KEY).unwrap().unwrap();
    match serde_json::from_str(&raw).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected array, got {other}"),
    }
}

#[test]
fn upserts_are_written_through_and_reload() {
    let backing = MemoryStore::new();
    let mut history = HistoryStore::load(Box::new(backing.clone()), HistorySettings::default());
    assert!(history.entries().is_empty());

    assert_eq!(history.upsert(entry("a", 10)), SaveOutcome::Saved);
    assert_eq!(history.upsert(entry("b", 5)), SaveOutcome::Saved);
    assert_eq!(stored_entries(&backing).len(), 2);

    let reloaded = HistoryStore::load(Box::new(backing), HistorySettings::default());
    let jobs: Vec<&str> = reloaded.entries().iter().map(|e| e.job_id.as_str()).collect();
    assert_eq!(jobs, vec!["b", "a"]);
    assert_eq!(reloaded.entries(), history.entries());
}

#[test]
fn malformed_storage_loads_as_empty() {
    for raw in ["{not json", r#"{"jobId":"x"}"#, "42"] {
        let mut backing = MemoryStore::new();
        backing.set(HISTORY_KEY, raw).unwrap();
        let history = HistoryStore::load(Box::new(backing), HistorySettings::default());
        assert!(history.entries().is_empty(), "raw {raw:?}");
    }
}

#[test]
fn unreadable_entries_are_skipped() {
    let good = serde_json::to_value(entry("good", 1)).unwrap();
    let raw = json!([good, {"id": "nope"}, 7]).to_string();
    let mut backing = MemoryStore::new();
    backing.set(HISTORY_KEY, &raw).unwrap();

    let history = HistoryStore::load(Box::new(backing), HistorySettings::default());
    assert_eq!(history.entries().len(), 1);
    assert_eq!(history.entries()[0].job_id, JobHandle::new("good"));
}

#[test]
fn load_truncates_oversized_history() {
    let items: Vec<HistoryEntry> = (0..70).map(|i| entry(&format!("j{i}"), i)).collect();
    let mut backing = MemoryStore::new();
    backing
        .set(HISTORY_KEY, &serde_json::to_string(&items).unwrap())
        .unwrap();

    let history = HistoryStore::load(Box::new(backing), HistorySettings::default());
    assert_eq!(history.entries().len(), 50);
    assert_eq!(history.entries()[0].job_id, JobHandle::new("j0"));
}

#[test]
fn quota_exhaustion_trims_to_degraded_capacity() {
    let backing = MemoryStore::new();
    let mut history = HistoryStore::load(Box::new(backing.clone()), HistorySettings::default());
    for i in 0..30 {
        history.upsert(entry(&format!("j{i}"), 100 - i));
    }
    assert_eq!(history.entries().len(), 30);

    // Room for a little over 20 entries, not 31.
    let one_entry = serde_json::to_string(&entry("j99", 0)).unwrap().len() as u64;
    backing.set_quota(Some(one_entry * 22));

    let outcome = history.upsert(entry("newest", 0));
    assert_eq!(outcome, SaveOutcome::Trimmed { kept: 20 });
    assert_eq!(history.entries().len(), 20);
    assert_eq!(history.entries()[0].job_id, JobHandle::new("newest"));
    assert_eq!(stored_entries(&backing).len(), 20);
}

#[test]
fn double_quota_failure_keeps_memory_copy() {
    let backing = MemoryStore::with_quota(10);
    let mut history = HistoryStore::load(Box::new(backing.clone()), HistorySettings::default());

    let outcome = history.upsert(entry("a", 0));
    assert_eq!(outcome, SaveOutcome::Failed);
    assert_eq!(history.entries().len(), 1);
    assert_eq!(backing.get(HISTORY_KEY).unwrap(), None);
}

#[test]
fn edited_slide_replaces_matching_sources_only() {
    let backing = MemoryStore::new();
    let mut history = HistoryStore::load(Box::new(backing.clone()), HistorySettings::default());
    history.upsert(entry("a", 2));
    history.upsert(entry("b", 1));

    let original = history.entries()[1].slides[0].clone();
    let edited = original.with_edit("data:image/png;base64,AAAA", Utc::now());

    assert_eq!(
        history.replace_edited_slide(&edited),
        Some(SaveOutcome::Saved)
    );
    let a = history.entries().iter().find(|e| e.job_id.as_str() == "a").unwrap();
    assert!(a.slides[0].edited);
    let b = history.entries().iter().find(|e| e.job_id.as_str() == "b").unwrap();
    assert!(!b.slides[0].edited);

    let unrelated = Slide::from_url("https://cdn.example/zzz.jpg").with_edit("data:x", Utc::now());
    assert_eq!(history.replace_edited_slide(&unrelated), None);

    let stored = stored_entries(&backing);
    let stored_a = stored.iter().find(|e| e["jobId"] == "a").unwrap();
    assert_eq!(stored_a["slides"][0]["edited"], json!(true));
}

#[test]
fn clear_removes_stored_history() {
    let backing = MemoryStore::new();
    let mut history = HistoryStore::load(Box::new(backing.clone()), HistorySettings::default());
    history.upsert(entry("a", 0));

    history.clear().unwrap();
    assert!(history.entries().is_empty());
    assert_eq!(backing.get(HISTORY_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn grouped_uses_recency_buckets() {
    let backing = MemoryStore::new();
    let mut history = HistoryStore::load(Box::new(backing), HistorySettings::default());
    history.upsert(entry("old", 60 * 24 * 3));
    history.upsert(entry("fresh", 30));

    let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let groups = history.grouped(&now);
    assert_eq!(groups.len(), 4);
    assert_eq!(groups[0].0, RecencyBucket::Today);
    assert_eq!(groups[0].1[0].job_id, JobHandle::new("fresh"));
    assert_eq!(groups[2].0, RecencyBucket::ThisWeek);
    assert_eq!(groups[2].1[0].job_id, JobHandle::new("old"));
}

#[test]
fn file_store_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("data");

    let mut history = HistoryStore::load(
        Box::new(FileStore::new(dir.clone())),
        HistorySettings::default(),
    );
    history.upsert(entry("disk", 0));
    assert!(dir.join(format!("{HISTORY_KEY}.json")).is_file());

    let reloaded = HistoryStore::load(Box::new(FileStore::new(dir)), HistorySettings::default());
    assert_eq!(reloaded.entries().len(), 1);
    assert_eq!(reloaded.entries()[0].job_id, JobHandle::new("disk"));
}

#[test]
fn file_store_quota_counts_other_keys() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::new(temp.path().to_path_buf()).with_quota(20);

    store.set("dark_mode", "false").unwrap();
    // Overwriting a key does not count its old value.
    store.set("dark_mode", "true").unwrap();

    let err = store.set(HISTORY_KEY, &"x".repeat(17)).unwrap_err();
    assert!(err.is_quota_exceeded());
    assert!(matches!(
        err,
        StorageError::QuotaExceeded {
            needed: 21,
            quota: 20
        }
    ));

    store.set(HISTORY_KEY, &"x".repeat(16)).unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join(format!("{HISTORY_KEY}.json"))).unwrap(),
        "x".repeat(16)
    );
}

#[test]
fn file_store_rejects_path_like_keys() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::new(temp.path().to_path_buf());
    let err = store.set("../escape", "x").unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));
    assert_eq!(store.get("missing").unwrap(), None);
}
