use carousel_core::{
    group_by_recency, History, HistoryEntry, RecencyBucket, Slide, DEGRADED_HISTORY_CAPACITY,
    HISTORY_CAPACITY,
};
use carousel_logging::{carousel_debug, carousel_error, carousel_info, carousel_warn};
use chrono::{DateTime, TimeZone};
use serde_json::Value;

use crate::storage::{KeyValueStore, StorageError};

/// Storage key holding the serialized history array.
pub const HISTORY_KEY: &str = "slide_history";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySettings {
    pub capacity: usize,
    /// Entries kept when a save hits the storage quota.
    pub degraded_capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: HISTORY_CAPACITY,
            degraded_capacity: DEGRADED_HISTORY_CAPACITY,
        }
    }
}

/// Result of writing the history back to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Quota was hit; the history was cut to `kept` entries and saved.
    Trimmed { kept: usize },
    /// Nothing could be written. The in-memory history is still current.
    Failed,
}

/// The local history, loaded from and written through to a [`KeyValueStore`].
///
/// Storage failures never propagate to callers: a generation that finished
/// must not be reported as failed because its history could not be saved.
pub struct HistoryStore {
    storage: Box<dyn KeyValueStore>,
    history: History,
    settings: HistorySettings,
}

impl HistoryStore {
    /// Reads the stored history. Missing or unreadable data yields an empty
    /// history; individual malformed entries are skipped.
    pub fn load(storage: Box<dyn KeyValueStore>, settings: HistorySettings) -> Self {
        let history = read_history(storage.as_ref(), settings.capacity);
        carousel_debug!("Loaded {} history entries", history.len());
        Self {
            storage,
            history,
            settings,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn find(&self, id: i64) -> Option<&HistoryEntry> {
        self.history.find(id)
    }

    /// Inserts or replaces the entry for its job and saves.
    pub fn upsert(&mut self, entry: HistoryEntry) -> SaveOutcome {
        let job = entry.job_id.clone();
        if self.history.upsert(entry) {
            carousel_debug!("Replaced history entry for job {}", job);
        } else {
            carousel_info!("Added history entry for job {}", job);
        }
        self.persist()
    }

    /// Swaps an edited slide into every entry that shows its source image.
    /// Saves only when something changed.
    pub fn replace_edited_slide(&mut self, edited: &Slide) -> Option<SaveOutcome> {
        let replaced = self.history.replace_edited_slide(edited);
        if replaced == 0 {
            return None;
        }
        carousel_debug!("Replaced {} slide(s) with an edited version", replaced);
        Some(self.persist())
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.history.clear();
        self.write()?;
        carousel_info!("History cleared");
        Ok(())
    }

    /// Entries bucketed by age relative to `now`, newest first in each bucket.
    pub fn grouped<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Vec<(RecencyBucket, Vec<&HistoryEntry>)> {
        group_by_recency(self.history.entries(), now)
    }

    /// Writes the history; on quota exhaustion trims to the degraded
    /// capacity and tries once more.
    pub fn persist(&mut self) -> SaveOutcome {
        match self.write() {
            Ok(()) => SaveOutcome::Saved,
            Err(err) if err.is_quota_exceeded() => {
                let kept = self.settings.degraded_capacity.min(self.history.len());
                carousel_warn!("History storage full ({}), keeping {} entries", err, kept);
                self.history.truncate(kept);
                match self.write() {
                    Ok(()) => SaveOutcome::Trimmed { kept },
                    Err(err) => {
                        carousel_error!("Failed to save trimmed history: {}", err);
                        SaveOutcome::Failed
                    }
                }
            }
            Err(err) => {
                carousel_error!("Failed to save history: {}", err);
                SaveOutcome::Failed
            }
        }
    }

    fn write(&mut self) -> Result<(), StorageError> {
        let text = serde_json::to_string(self.history.entries())?;
        self.storage.set(HISTORY_KEY, &text)
    }
}

fn read_history(storage: &dyn KeyValueStore, capacity: usize) -> History {
    let raw = match storage.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return History::new(capacity),
        Err(err) => {
            carousel_warn!("Could not read history: {}", err);
            return History::new(capacity);
        }
    };

    let items = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            carousel_warn!("Stored history is not a list, starting empty");
            return History::new(capacity);
        }
        Err(err) => {
            carousel_warn!("Stored history is not valid JSON ({}), starting empty", err);
            return History::new(capacity);
        }
    };

    let total = items.len();
    let entries: Vec<HistoryEntry> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(err) => {
                carousel_debug!("Skipping unreadable history entry: {}", err);
                None
            }
        })
        .collect();
    if entries.len() < total {
        carousel_warn!(
            "Skipped {} unreadable history entries",
            total - entries.len()
        );
    }
    History::with_entries(entries, capacity)
}
