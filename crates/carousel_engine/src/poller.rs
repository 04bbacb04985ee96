use std::sync::{Arc, Mutex, PoisonError};

use carousel_core::{
    GenerationMode, JobHandle, PollContext, PollEffect, PollMachine, PollMsg, PollOutcome,
    PollSettings, SessionError, Slide,
};
use carousel_logging::{carousel_debug, carousel_info, carousel_warn};
use chrono::Utc;
use serde_json::Value;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    GenerationClient, HistoryStore, RequestError, Reservation, SaveOutcome, SharedSession,
};

/// Observable milestones of one generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Submitted { job: JobHandle, mode: GenerationMode },
    Progress { job: JobHandle, percent: u8 },
    SlidesReady { job: JobHandle, slides: Vec<Slide> },
    Finished { job: JobHandle, outcome: PollOutcome },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: GenerationEvent);
}

/// Where job status comes from.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job: &JobHandle) -> Result<Value, RequestError>;
}

/// Status endpoint of one generation mode.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: GenerationClient,
    endpoint: String,
}

impl HttpStatusSource {
    pub fn new(client: GenerationClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_status(&self, job: &JobHandle) -> Result<Value, RequestError> {
        self.client.fetch_status(&self.endpoint, job).await
    }
}

/// Drives a [`PollMachine`] against a [`StatusSource`] until the job ends or
/// the session is stopped.
pub struct JobPoller {
    source: Arc<dyn StatusSource>,
    session: SharedSession,
    history: Arc<Mutex<HistoryStore>>,
    settings: PollSettings,
}

impl JobPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        session: SharedSession,
        history: Arc<Mutex<HistoryStore>>,
        settings: PollSettings,
    ) -> Self {
        Self {
            source,
            session,
            history,
            settings,
        }
    }

    /// Polls `context.job` once immediately and then every interval.
    ///
    /// A cycle never starts before the previous one finished; late ticks are
    /// delayed, not bunched. Returns the terminal outcome, or `None` when the
    /// session was stopped from outside.
    pub async fn run(
        &self,
        context: PollContext,
        sink: &dyn ProgressSink,
    ) -> Result<Option<PollOutcome>, SessionError> {
        let reservation = self.session.reserve()?;
        self.run_reserved(reservation, context, sink).await
    }

    /// Like [`JobPoller::run`], on a session reserved before the job was
    /// submitted.
    pub async fn run_reserved(
        &self,
        reservation: Reservation,
        context: PollContext,
        sink: &dyn ProgressSink,
    ) -> Result<Option<PollOutcome>, SessionError> {
        let job = context.job.clone();
        let mut machine = PollMachine::new(context, self.settings.clone());
        let Some(token) = reservation.begin(&mut machine, Instant::now().into_std())? else {
            return Ok(None);
        };

        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Some(outcome) = self.cycle(&mut machine, &token, sink).await {
            return Ok(Some(outcome));
        }
        while !token.is_cancelled() {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Some(outcome) = self.cycle(&mut machine, &token, sink).await {
                return Ok(Some(outcome));
            }
        }

        carousel_info!("Polling for job {} stopped", job);
        Ok(None)
    }

    async fn cycle(
        &self,
        machine: &mut PollMachine,
        token: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Option<PollOutcome> {
        let tick = PollMsg::Tick {
            now: Instant::now().into_std(),
        };
        let mut outcome = None;
        for effect in self.session.apply(machine, tick) {
            let job = match effect {
                PollEffect::FetchStatus { job } => job,
                other => {
                    outcome = outcome.or(self.execute(machine, other, sink));
                    continue;
                }
            };
            let msg = match self.source.fetch_status(&job).await {
                Ok(body) => PollMsg::StatusReceived {
                    body,
                    received_at: Utc::now(),
                },
                Err(err) => PollMsg::StatusFailed {
                    reason: err.to_string(),
                },
            };
            if token.is_cancelled() {
                carousel_debug!("Discarding status for stopped job {}", job);
                return None;
            }
            for follow_up in self.session.apply(machine, msg) {
                outcome = outcome.or(self.execute(machine, follow_up, sink));
            }
        }
        outcome
    }

    fn execute(
        &self,
        machine: &PollMachine,
        effect: PollEffect,
        sink: &dyn ProgressSink,
    ) -> Option<PollOutcome> {
        let job = machine.context().job.clone();
        match effect {
            PollEffect::StopTimer => {}
            PollEffect::FetchStatus { .. } => {
                carousel_warn!("Unexpected nested status fetch for job {}", job);
            }
            PollEffect::Progress(percent) => sink.emit(GenerationEvent::Progress { job, percent }),
            PollEffect::RecordHistory(entry) => {
                let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                match history.upsert(entry) {
                    SaveOutcome::Saved => {}
                    SaveOutcome::Trimmed { kept } => {
                        carousel_warn!("History trimmed to {} entries to fit storage", kept);
                    }
                    SaveOutcome::Failed => {
                        carousel_warn!("History for job {} kept in memory only", job);
                    }
                }
            }
            PollEffect::RenderSlides(slides) => {
                sink.emit(GenerationEvent::SlidesReady { job, slides });
            }
            PollEffect::Notify(outcome) => {
                sink.emit(GenerationEvent::Finished {
                    job,
                    outcome: outcome.clone(),
                });
                return Some(outcome);
            }
        }
        None
    }
}
