//! Terminal output for generation progress and the history views.

use std::io::{self, Write};

use carousel_core::{HistoryEntry, RecencyBucket};
use carousel_engine::{GenerationEvent, ProgressSink};
use chrono::Local;

/// Prints generation events to stdout as they arrive.
pub(crate) struct TerminalSink;

impl ProgressSink for TerminalSink {
    fn emit(&self, event: GenerationEvent) {
        let mut out = io::stdout().lock();
        let _ = match event {
            GenerationEvent::Submitted { job, mode } => {
                writeln!(out, "Submitted {mode} generation (job {job}). Waiting for slides...")
            }
            GenerationEvent::Progress { percent, .. } => writeln!(out, "  progress: {percent}%"),
            GenerationEvent::SlidesReady { slides, .. } => {
                let _ = writeln!(out, "Slides:");
                for (index, slide) in slides.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "  {:>2}. {}",
                        index + 1,
                        slide.display_url().unwrap_or("(no image)")
                    );
                }
                Ok(())
            }
            GenerationEvent::Finished { outcome, .. } => writeln!(out, "{outcome}"),
        };
    }
}

/// One-line summary used in the history listing.
pub(crate) fn entry_line(entry: &HistoryEntry) -> String {
    format!(
        "[{}] {} {:<6} {:>2} slides  {}",
        entry.id,
        entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        entry.mode.name(),
        entry.slides.len(),
        entry.prompt_preview
    )
}

/// Non-empty buckets with a heading each; a placeholder when all are empty.
pub(crate) fn history_listing(groups: &[(RecencyBucket, Vec<&HistoryEntry>)]) -> String {
    let mut text = String::new();
    for (bucket, entries) in groups.iter().filter(|(_, entries)| !entries.is_empty()) {
        text.push_str(bucket.label());
        text.push('\n');
        for entry in entries {
            text.push_str("  ");
            text.push_str(&entry_line(entry));
            text.push('\n');
        }
    }
    if text.is_empty() {
        text.push_str("No history yet.\n");
    }
    text
}

pub(crate) fn entry_details(entry: &HistoryEntry) -> String {
    let mut text = format!(
        "Job:      {}\nMode:     {}\nCreated:  {}\nCreator:  {}\nTemplate: {}\nPrompt:   {}\n",
        entry.job_id,
        entry.mode,
        entry.timestamp.with_timezone(&Local).to_rfc2822(),
        entry.creator_name,
        entry.template,
        entry.prompt_preview
    );
    for (index, slide) in entry.slides.iter().enumerate() {
        let marker = if slide.edited { " (edited)" } else { "" };
        text.push_str(&format!(
            "  {:>2}. {}{}\n",
            index + 1,
            slide.primary_url().unwrap_or("(no image)"),
            marker
        ));
    }
    text
}
