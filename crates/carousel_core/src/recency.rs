use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::HistoryEntry;

/// Presentation buckets for the history list, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecencyBucket {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
}

impl RecencyBucket {
    pub const ALL: [RecencyBucket; 4] = [
        RecencyBucket::Today,
        RecencyBucket::Yesterday,
        RecencyBucket::ThisWeek,
        RecencyBucket::ThisMonth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RecencyBucket::Today => "Today",
            RecencyBucket::Yesterday => "Yesterday",
            RecencyBucket::ThisWeek => "This week",
            RecencyBucket::ThisMonth => "This month",
        }
    }

    /// Calendar days are taken in the time zone of `now`.
    pub fn classify<Tz: TimeZone>(timestamp: &DateTime<Utc>, now: &DateTime<Tz>) -> Self {
        let local_day = timestamp.with_timezone(&now.timezone()).date_naive();
        let today = now.date_naive();

        if local_day == today {
            RecencyBucket::Today
        } else if today.pred_opt() == Some(local_day) {
            RecencyBucket::Yesterday
        } else if now.clone().signed_duration_since(*timestamp) < Duration::hours(168) {
            RecencyBucket::ThisWeek
        } else {
            RecencyBucket::ThisMonth
        }
    }
}

/// Partitions entries into the four buckets, keeping their relative order.
/// Every bucket is present in the result, possibly empty.
pub fn group_by_recency<'a, Tz: TimeZone>(
    entries: &'a [HistoryEntry],
    now: &DateTime<Tz>,
) -> Vec<(RecencyBucket, Vec<&'a HistoryEntry>)> {
    let mut groups: Vec<(RecencyBucket, Vec<&HistoryEntry>)> = RecencyBucket::ALL
        .iter()
        .map(|bucket| (*bucket, Vec::new()))
        .collect();

    for entry in entries {
        let bucket = RecencyBucket::classify(&entry.timestamp, now);
        if let Some((_, items)) = groups.iter_mut().find(|(b, _)| *b == bucket) {
            items.push(entry);
        }
    }
    groups
}
