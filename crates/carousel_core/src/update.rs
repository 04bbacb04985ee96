use std::time::Instant;

use carousel_logging::{carousel_debug, carousel_info, carousel_warn};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::effect::GENERIC_FAILURE;
use crate::{
    parse_job_response, GenerationSession, HistoryEntry, JobStatus, PollContext, PollEffect,
    PollMsg, PollOutcome, PollSettings, PollState, SessionError, Slide,
};

/// Polling state machine for one job.
///
/// Counters live in the shared [`GenerationSession`]; the machine only holds
/// its own state and the originating request. All side effects are returned
/// as [`PollEffect`]s for the driver to execute.
#[derive(Debug, Clone)]
pub struct PollMachine {
    state: PollState,
    context: PollContext,
    settings: PollSettings,
}

impl PollMachine {
    pub fn new(context: PollContext, settings: PollSettings) -> Self {
        Self {
            state: PollState::Idle,
            context,
            settings,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn context(&self) -> &PollContext {
        &self.context
    }

    /// `Idle -> Polling`. Claims the session for this job.
    pub fn start(
        &mut self,
        session: &mut GenerationSession,
        now: Instant,
    ) -> Result<(), SessionError> {
        session.start(self.context.job.clone(), now)?;
        self.state = PollState::Polling;
        carousel_info!(
            "Polling started for job {} ({} mode)",
            self.context.job,
            self.context.mode
        );
        Ok(())
    }

    /// Applies a message and returns the effects to run, in order.
    pub fn update(&mut self, session: &mut GenerationSession, msg: PollMsg) -> Vec<PollEffect> {
        if let PollMsg::Stop = msg {
            return self.stop(session);
        }
        if self.state != PollState::Polling {
            carousel_debug!("Ignoring {:?} in state {:?}", msg, self.state);
            return Vec::new();
        }
        if session.active_for(&self.context.job).is_none() {
            // The session was stopped or taken over; late responses are dropped.
            carousel_debug!("Session for job {} is gone, going idle", self.context.job);
            self.state = PollState::Idle;
            return Vec::new();
        }

        match msg {
            PollMsg::Tick { now } => self.on_tick(session, now),
            PollMsg::StatusReceived { body, received_at } => {
                self.on_status(session, &body, received_at)
            }
            PollMsg::StatusFailed { reason } => self.on_failure(session, &reason),
            PollMsg::Stop => Vec::new(),
        }
    }

    fn on_tick(&mut self, session: &mut GenerationSession, now: Instant) -> Vec<PollEffect> {
        let Some(active) = session.active_for(&self.context.job) else {
            return Vec::new();
        };
        active.poll_attempts += 1;
        let attempts = active.poll_attempts;
        let elapsed = now.saturating_duration_since(active.started_at);

        if attempts > self.settings.max_attempts || elapsed > self.settings.max_elapsed() {
            carousel_warn!(
                "Job {} timed out after {} attempts ({:?})",
                self.context.job,
                attempts - 1,
                elapsed
            );
            return self.finish(session, PollOutcome::TimedOut);
        }

        carousel_debug!(
            "Polling attempt {}/{} for job {}",
            attempts,
            self.settings.max_attempts,
            self.context.job
        );
        vec![PollEffect::FetchStatus {
            job: self.context.job.clone(),
        }]
    }

    fn on_status(
        &mut self,
        session: &mut GenerationSession,
        body: &Value,
        received_at: DateTime<Utc>,
    ) -> Vec<PollEffect> {
        let snapshot = match parse_job_response(body) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                carousel_debug!("Job {} not available yet, waiting", self.context.job);
                self.reset_errors(session);
                return Vec::new();
            }
            Err(err) => return self.on_failure(session, &err.to_string()),
        };

        if snapshot.status == JobStatus::Completed {
            match snapshot.decode_slides() {
                Ok(slides) if !slides.is_empty() => {
                    return self.on_completed(session, slides, received_at);
                }
                Ok(_) => {}
                Err(err) => return self.on_failure(session, &err.to_string()),
            }
        }

        match snapshot.status {
            JobStatus::OutOfLimit => self.finish(session, PollOutcome::OutOfLimit),
            JobStatus::EmptyOutput => self.finish(session, PollOutcome::EmptyOutput),
            JobStatus::Failed => {
                let message = snapshot
                    .failure_message()
                    .unwrap_or(GENERIC_FAILURE)
                    .to_string();
                self.finish(session, PollOutcome::Failed { message })
            }
            ref status => {
                carousel_debug!("Job {} still processing, status: {:?}", self.context.job, status);
                self.reset_errors(session);
                let progress = match snapshot.clamped_progress() {
                    Some(reported) => reported,
                    None => self.estimated_progress(session),
                };
                vec![PollEffect::Progress(progress)]
            }
        }
    }

    fn on_completed(
        &mut self,
        session: &mut GenerationSession,
        slides: Vec<Slide>,
        received_at: DateTime<Utc>,
    ) -> Vec<PollEffect> {
        self.reset_errors(session);
        let outcome = PollOutcome::Completed {
            slide_count: slides.len(),
        };
        let entry = HistoryEntry::from_completed(&self.context, slides.clone(), received_at);

        let mut effects = self.finish(session, outcome);
        // Notify stays last so observers see history and slides first.
        let notify = effects.pop();
        effects.push(PollEffect::RecordHistory(entry));
        effects.push(PollEffect::RenderSlides(slides));
        effects.extend(notify);
        effects
    }

    fn on_failure(&mut self, session: &mut GenerationSession, reason: &str) -> Vec<PollEffect> {
        let Some(active) = session.active_for(&self.context.job) else {
            return Vec::new();
        };
        active.consecutive_errors += 1;
        let errors = active.consecutive_errors;

        if errors >= self.settings.max_consecutive_errors {
            carousel_warn!(
                "Giving up on job {} after {} consecutive polling errors: {}",
                self.context.job,
                errors,
                reason
            );
            return self.finish(session, PollOutcome::AbortedByErrors);
        }

        carousel_warn!(
            "Polling error for job {} (continuing {}/{}): {}",
            self.context.job,
            errors,
            self.settings.max_consecutive_errors,
            reason
        );
        Vec::new()
    }

    fn stop(&mut self, session: &mut GenerationSession) -> Vec<PollEffect> {
        if session.active_for(&self.context.job).is_some() {
            session.stop();
        }
        if !self.state.is_terminal() {
            self.state = PollState::Idle;
        }
        vec![PollEffect::StopTimer]
    }

    fn finish(&mut self, session: &mut GenerationSession, outcome: PollOutcome) -> Vec<PollEffect> {
        session.stop();
        self.state = outcome.state();
        carousel_info!("Job {} finished: {:?}", self.context.job, outcome);
        vec![PollEffect::StopTimer, PollEffect::Notify(outcome)]
    }

    fn reset_errors(&self, session: &mut GenerationSession) {
        if let Some(active) = session.active_for(&self.context.job) {
            active.consecutive_errors = 0;
        }
    }

    /// Synthetic progress so the indicator moves without server progress;
    /// capped below 100 until a real completion arrives.
    fn estimated_progress(&self, session: &mut GenerationSession) -> u8 {
        let attempts = session
            .active_for(&self.context.job)
            .map_or(0, |active| active.poll_attempts);
        let ceiling = self.settings.max_attempts.max(1);
        let estimate = (f64::from(attempts) / f64::from(ceiling) * 90.0).min(90.0);
        estimate.round() as u8
    }
}
