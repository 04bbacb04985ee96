use std::time::Duration;

use crate::{GenerationMode, GenerationRequest, JobHandle};

/// Cadence and give-up budgets for one polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub max_consecutive_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            max_attempts: 60,
            max_consecutive_errors: 3,
        }
    }
}

impl PollSettings {
    /// Wall-clock ceiling for a session: attempts times interval.
    pub fn max_elapsed(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed,
    TimedOut,
    OutOfLimit,
    EmptyOutput,
    AbortedByErrors,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollState::Idle | PollState::Polling)
    }
}

/// What the poller needs to know about the originating request to record
/// a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollContext {
    pub job: JobHandle,
    pub mode: GenerationMode,
    pub prompt: String,
    pub creator_name: String,
    pub template: String,
}

impl PollContext {
    pub fn new(job: JobHandle, mode: GenerationMode, request: &GenerationRequest) -> Self {
        Self {
            job,
            mode,
            prompt: request.prompt().to_string(),
            creator_name: request.creator_name().to_string(),
            template: request.template_style().to_string(),
        }
    }
}
