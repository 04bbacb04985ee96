use carousel_core::{
    group_by_recency, GenerationMode, GenerationSession, History, HistoryEntry, JobHandle,
    RecencyBucket, SessionError, Slide, HISTORY_CAPACITY,
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

fn entry(job: &str, at: DateTime<Utc>) -> HistoryEntry {
    HistoryEntry {
        id: at.timestamp_millis(),
        prompt_preview: format!("prompt for {job}"),
        slides: vec![Slide::from_url(format!("https://cdn/{job}/1.jpg"))],
        creator_name: "none".to_string(),
        template: "minimal".to_string(),
        timestamp: at,
        job_id: JobHandle::new(job),
        mode: GenerationMode::Idea,
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

#[test]
fn upsert_inserts_newest_first() {
    let mut history = History::default();
    history.upsert(entry("a", base_time()));
    history.upsert(entry("b", base_time()));
    let jobs: Vec<_> = history.entries().iter().map(|e| e.job_id.as_str()).collect();
    assert_eq!(jobs, vec!["b", "a"]);
}

#[test]
fn repeated_job_replaces_in_place() {
    let mut history = History::default();
    history.upsert(entry("a", base_time()));
    history.upsert(entry("b", base_time()));
    history.upsert(entry("c", base_time()));

    let mut newer = entry("b", base_time() + Duration::minutes(5));
    newer.prompt_preview = "regenerated".to_string();
    let replaced = history.upsert(newer.clone());

    assert!(replaced);
    assert_eq!(history.len(), 3);
    assert_eq!(history.entries()[1], newer);
}

#[test]
fn overflow_keeps_the_fifty_newest() {
    let mut history = History::default();
    for i in 0..75 {
        history.upsert(entry(&format!("job-{i}"), base_time() + Duration::seconds(i)));
    }
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history.entries()[0].job_id.as_str(), "job-74");
    assert_eq!(history.entries()[49].job_id.as_str(), "job-25");
    assert!(history.find_by_job(&JobHandle::new("job-24")).is_none());
}

#[test]
fn with_entries_truncates_to_capacity() {
    let entries: Vec<_> = (0..60)
        .map(|i| entry(&format!("job-{i}"), base_time()))
        .collect();
    let history = History::with_entries(entries, HISTORY_CAPACITY);
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history.entries()[0].job_id.as_str(), "job-0");
}

#[test]
fn find_by_id_and_edit_replacement() {
    let mut history = History::default();
    let first = entry("a", base_time());
    history.upsert(first.clone());
    history.upsert(entry("b", base_time() + Duration::seconds(1)));

    assert_eq!(history.find(first.id).map(|e| &e.job_id), Some(&first.job_id));

    let edited = first.slides[0].with_edit("data:image/jpeg;base64,QQ==", base_time());
    assert_eq!(history.replace_edited_slide(&edited), 1);
    let stored = history.find_by_job(&JobHandle::new("a")).unwrap();
    assert!(stored.slides[0].edited);
    assert_eq!(stored.slides[0].url, first.slides[0].url);
}

#[test]
fn entry_serializes_with_browser_field_names() {
    let value = serde_json::to_value(entry("x123", base_time())).unwrap();
    for key in ["id", "script", "slides", "creatorName", "template", "timestamp", "jobId", "mode"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["mode"], "ide");
}

#[test]
fn recency_buckets_follow_calendar_days() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let entries = vec![
        entry("today-early", Utc.with_ymd_and_hms(2026, 3, 10, 0, 5, 0).unwrap()),
        entry("yesterday-late", Utc.with_ymd_and_hms(2026, 3, 9, 23, 30, 0).unwrap()),
        entry("yesterday-early", Utc.with_ymd_and_hms(2026, 3, 9, 0, 1, 0).unwrap()),
        entry("four-days", now - Duration::days(4)),
        entry("eight-days", now - Duration::days(8)),
        entry("today-late", Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap()),
    ];

    let groups = group_by_recency(&entries, &now);
    let summary: Vec<(RecencyBucket, Vec<&str>)> = groups
        .iter()
        .map(|(bucket, items)| (*bucket, items.iter().map(|e| e.job_id.as_str()).collect()))
        .collect();

    assert_eq!(
        summary,
        vec![
            (RecencyBucket::Today, vec!["today-early", "today-late"]),
            (RecencyBucket::Yesterday, vec!["yesterday-late", "yesterday-early"]),
            (RecencyBucket::ThisWeek, vec!["four-days"]),
            (RecencyBucket::ThisMonth, vec!["eight-days"]),
        ]
    );
}

#[test]
fn recency_uses_the_time_zone_of_now() {
    // 23:30 UTC on the 9th is already the 10th in UTC+7.
    let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
    let now = jakarta.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let stamp = Utc.with_ymd_and_hms(2026, 3, 9, 23, 30, 0).unwrap();
    assert_eq!(RecencyBucket::classify(&stamp, &now), RecencyBucket::Today);
}

#[test]
fn empty_history_yields_four_empty_buckets() {
    let groups = group_by_recency(&[], &base_time());
    assert_eq!(groups.len(), 4);
    assert!(groups.iter().all(|(_, items)| items.is_empty()));
}

#[test]
fn session_is_single_flight() {
    let mut session = GenerationSession::new();
    let now = std::time::Instant::now();
    session.start(JobHandle::new("first"), now).unwrap();

    for attempt in ["second", "third"] {
        let err = session.start(JobHandle::new(attempt), now).unwrap_err();
        assert_eq!(
            err,
            SessionError::AlreadyGenerating {
                active: JobHandle::new("first")
            }
        );
    }
    assert_eq!(session.active().unwrap().job, JobHandle::new("first"));

    assert!(session.stop().is_some());
    assert!(session.stop().is_none());
    session.start(JobHandle::new("second"), now).unwrap();
}

#[test]
fn reservation_blocks_until_started_or_released() {
    let mut session = GenerationSession::new();
    let now = std::time::Instant::now();
    session.reserve().unwrap();
    assert!(session.is_generating());
    assert!(session.active().is_none());
    assert_eq!(session.reserve(), Err(SessionError::Submitting));

    assert!(session.release());
    assert!(!session.release());
    session.reserve().unwrap();
    session.start(JobHandle::new("job"), now).unwrap();
    assert!(!session.release());
    assert_eq!(session.active().unwrap().job, JobHandle::new("job"));
}

#[test]
fn stored_entries_accept_numeric_job_ids() {
    let stored = json!([
        {
            "id": 1741600000000_i64,
            "script": "numeric job",
            "slides": [{"url": "https://cdn/n/1.jpg"}],
            "timestamp": "2026-03-10T12:00:00Z",
            "jobId": 12345,
            "mode": "ide"
        },
        {
            "id": 1741600000001_i64,
            "script": "text job",
            "timestamp": "2026-03-10T12:00:01Z",
            "jobId": "abc",
            "mode": "skrip"
        }
    ]);
    let entries: Vec<HistoryEntry> = serde_json::from_value(stored).unwrap();

    assert_eq!(entries[0].job_id, JobHandle::new("12345"));
    assert_eq!(entries[1].job_id, JobHandle::new("abc"));
    assert_eq!(
        serde_json::to_value(&entries[0]).unwrap()["jobId"],
        json!("12345")
    );
}
