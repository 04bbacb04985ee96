use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque job identifier handed out by the submission endpoint.
///
/// Always written as a string; stored histories may carry numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl<'de> Deserialize<'de> for JobHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Self(id),
            RawId::Number(id) => Self(id.to_string()),
        })
    }
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Bookkeeping for the generation currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGeneration {
    pub job: JobHandle,
    pub poll_attempts: u32,
    pub consecutive_errors: u32,
    pub started_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("generation already in progress (job {active})")]
    AlreadyGenerating { active: JobHandle },
    #[error("generation already in progress (submitting)")]
    Submitting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    /// Reserved while the submit request is in flight; no job id yet.
    Submitting,
    Polling(ActiveGeneration),
}

/// Single-flight guard for generations.
///
/// The whole state is one [`Phase`], so `start` and `stop` replace it at
/// once and a half-reset session is unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSession {
    phase: Phase,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from reservation until the job ends or is stopped.
    pub fn is_generating(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    pub fn active(&self) -> Option<&ActiveGeneration> {
        match &self.phase {
            Phase::Polling(active) => Some(active),
            _ => None,
        }
    }

    /// Fails when another generation is reserved or in flight.
    pub fn ensure_idle(&self) -> Result<(), SessionError> {
        match &self.phase {
            Phase::Idle => Ok(()),
            Phase::Submitting => Err(SessionError::Submitting),
            Phase::Polling(active) => Err(SessionError::AlreadyGenerating {
                active: active.job.clone(),
            }),
        }
    }

    /// `Idle -> Submitting`. Holds the session while a job is being submitted.
    pub fn reserve(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.phase = Phase::Submitting;
        Ok(())
    }

    /// Drops a reservation that never became a job. Returns whether one
    /// was held.
    pub fn release(&mut self) -> bool {
        if self.is_submitting() {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    /// Starts polling `job`, from idle or from a reservation.
    pub fn start(&mut self, job: JobHandle, now: Instant) -> Result<(), SessionError> {
        if let Phase::Polling(active) = &self.phase {
            return Err(SessionError::AlreadyGenerating {
                active: active.job.clone(),
            });
        }
        self.phase = Phase::Polling(ActiveGeneration {
            job,
            poll_attempts: 0,
            consecutive_errors: 0,
            started_at: now,
        });
        Ok(())
    }

    /// Clears the session, reservation included. Safe to call when nothing
    /// is running.
    pub fn stop(&mut self) -> Option<ActiveGeneration> {
        match std::mem::take(&mut self.phase) {
            Phase::Polling(active) => Some(active),
            _ => None,
        }
    }

    /// The active generation, if it belongs to `job`.
    pub fn active_for(&mut self, job: &JobHandle) -> Option<&mut ActiveGeneration> {
        match &mut self.phase {
            Phase::Polling(active) if &active.job == job => Some(active),
            _ => None,
        }
    }
}
