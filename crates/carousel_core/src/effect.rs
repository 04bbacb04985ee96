use std::fmt;

use crate::{HistoryEntry, JobHandle, PollState, Slide};

/// Fallback text when a failed job carries no error message.
pub(crate) const GENERIC_FAILURE: &str = "Something went wrong";

#[derive(Debug, Clone, PartialEq)]
pub enum PollEffect {
    FetchStatus { job: JobHandle },
    StopTimer,
    Progress(u8),
    RecordHistory(HistoryEntry),
    RenderSlides(Vec<Slide>),
    /// Exactly one per terminal outcome.
    Notify(PollOutcome),
}

/// Terminal result of a polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { slide_count: usize },
    Failed { message: String },
    OutOfLimit,
    EmptyOutput,
    TimedOut,
    AbortedByErrors,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. })
    }

    pub fn state(&self) -> PollState {
        match self {
            PollOutcome::Completed { .. } => PollState::Completed,
            PollOutcome::Failed { .. } => PollState::Failed,
            PollOutcome::OutOfLimit => PollState::OutOfLimit,
            PollOutcome::EmptyOutput => PollState::EmptyOutput,
            PollOutcome::TimedOut => PollState::TimedOut,
            PollOutcome::AbortedByErrors => PollState::AbortedByErrors,
        }
    }

    /// Text shown to the user for this outcome.
    pub fn user_message(&self) -> String {
        match self {
            PollOutcome::Completed { slide_count } => {
                format!("Successfully generated {slide_count} slides!")
            }
            PollOutcome::Failed { message } => {
                format!("Generation failed: {message}. Please try again in a moment.")
            }
            PollOutcome::OutOfLimit => {
                "Generation quota exceeded. Please try again later.".to_string()
            }
            PollOutcome::EmptyOutput => {
                "Generation failed, please try again in a moment.".to_string()
            }
            PollOutcome::TimedOut => {
                "Generation timeout. The process took too long. Please try again.".to_string()
            }
            PollOutcome::AbortedByErrors => {
                "Multiple polling failures. Please check your connection and try again."
                    .to_string()
            }
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}
