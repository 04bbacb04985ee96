use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GenerationMode, JobHandle, PollContext, Slide};

/// Maximum number of entries kept in the history.
pub const HISTORY_CAPACITY: usize = 50;
/// Size the history is cut down to when storage runs out of room.
pub const DEGRADED_HISTORY_CAPACITY: usize = 20;
/// Characters of the prompt kept in an entry preview.
pub const PROMPT_PREVIEW_CHARS: usize = 100;

/// A completed job as remembered locally.
///
/// Serialized field names match histories written by the browser client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Creation time in epoch milliseconds.
    pub id: i64,
    #[serde(rename = "script")]
    pub prompt_preview: String,
    #[serde(default)]
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub creator_name: String,
    #[serde(default)]
    pub template: String,
    pub timestamp: DateTime<Utc>,
    pub job_id: JobHandle,
    pub mode: GenerationMode,
}

impl HistoryEntry {
    pub fn from_completed(context: &PollContext, slides: Vec<Slide>, at: DateTime<Utc>) -> Self {
        Self {
            id: at.timestamp_millis(),
            prompt_preview: preview_prompt(&context.prompt),
            slides,
            creator_name: context.creator_name.clone(),
            template: context.template.clone(),
            timestamp: at,
            job_id: context.job.clone(),
            mode: context.mode,
        }
    }
}

/// First [`PROMPT_PREVIEW_CHARS`] characters of `prompt`, with `...` when cut.
pub fn preview_prompt(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PROMPT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Newest-first, bounded list of history entries keyed by job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Adopts `entries` as-is (assumed newest first), cut to capacity.
    pub fn with_entries(mut entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        entries.truncate(capacity);
        Self { entries, capacity }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the entry for the same job in place, or inserts at the front.
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert(&mut self, entry: HistoryEntry) -> bool {
        let replaced = match self.entries.iter().position(|e| e.job_id == entry.job_id) {
            Some(index) => {
                self.entries[index] = entry;
                true
            }
            None => {
                self.entries.insert(0, entry);
                false
            }
        };
        self.entries.truncate(self.capacity);
        replaced
    }

    /// Keeps the `len` newest entries.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn find(&self, id: i64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_job(&self, job: &JobHandle) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| &e.job_id == job)
    }

    /// Swaps in an edited slide wherever its source image appears.
    /// Returns how many slides were replaced.
    pub fn replace_edited_slide(&mut self, edited: &Slide) -> usize {
        let mut replaced = 0;
        for slide in self.entries.iter_mut().flat_map(|e| e.slides.iter_mut()) {
            if slide.same_source(edited) {
                *slide = edited.clone();
                replaced += 1;
            }
        }
        replaced
    }
}
