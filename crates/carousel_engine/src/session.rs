use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use carousel_core::{
    ActiveGeneration, GenerationSession, PollEffect, PollMachine, PollMsg, SessionError,
};
use carousel_logging::carousel_info;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SessionSlot {
    session: GenerationSession,
    timer: Option<CancellationToken>,
}

/// The process-wide generation session plus the cancellation handle of the
/// poll loop that owns it.
///
/// Every mutation happens under one lock, so a stop and a status update
/// can never interleave halfway.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionSlot>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_generating(&self) -> bool {
        self.lock().session.is_generating()
    }

    /// Holds the session for one generation before its job exists.
    ///
    /// The reservation is released when dropped unless it was turned into a
    /// poll loop with [`Reservation::begin`].
    pub fn reserve(&self) -> Result<Reservation, SessionError> {
        let mut slot = self.lock();
        slot.session.reserve()?;
        let token = CancellationToken::new();
        slot.timer = Some(token.clone());
        Ok(Reservation {
            shared: self.clone(),
            token,
            claimed: false,
        })
    }

    /// Runs `machine.update` against the session. A [`PollEffect::StopTimer`]
    /// in the result cancels the loop before the lock is released.
    pub fn apply(&self, machine: &mut PollMachine, msg: PollMsg) -> Vec<PollEffect> {
        let mut slot = self.lock();
        let effects = machine.update(&mut slot.session, msg);
        if effects.iter().any(|e| matches!(e, PollEffect::StopTimer)) {
            if let Some(timer) = slot.timer.take() {
                timer.cancel();
            }
        }
        effects
    }

    /// Abandons the generation in flight or being submitted, if any. Safe to
    /// call repeatedly. Returns the polled generation that was stopped.
    pub fn stop_generation(&self) -> Option<ActiveGeneration> {
        let mut slot = self.lock();
        if let Some(timer) = slot.timer.take() {
            timer.cancel();
        }
        let stopped = slot.session.stop();
        if let Some(active) = &stopped {
            carousel_info!("Generation for job {} stopped", active.job);
        }
        stopped
    }
}

/// A claim on the [`SharedSession`] taken before submitting.
#[derive(Debug)]
pub struct Reservation {
    shared: SharedSession,
    token: CancellationToken,
    claimed: bool,
}

impl Reservation {
    /// Starts `machine` on the reserved session and returns the token that
    /// stops its poll loop. `Ok(None)` when the generation was stopped while
    /// it was being submitted.
    pub fn begin(
        mut self,
        machine: &mut PollMachine,
        now: Instant,
    ) -> Result<Option<CancellationToken>, SessionError> {
        let mut slot = self.shared.lock();
        if self.token.is_cancelled() {
            carousel_info!("Generation stopped before job {} started", machine.context().job);
            return Ok(None);
        }
        machine.start(&mut slot.session, now)?;
        self.claimed = true;
        Ok(Some(self.token.clone()))
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.claimed || self.token.is_cancelled() {
            return;
        }
        let mut slot = self.shared.lock();
        if slot.session.release() {
            slot.timer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_core::{GenerationMode, GenerationRequest, JobHandle, PollContext, PollSettings};

    fn machine(job: &str) -> PollMachine {
        let request = GenerationRequest::new("Topic", "Minimalist").unwrap();
        let context = PollContext::new(JobHandle::new(job), GenerationMode::Idea, &request);
        PollMachine::new(context, PollSettings::default())
    }

    fn begin(shared: &SharedSession, m: &mut PollMachine) -> CancellationToken {
        shared.reserve().unwrap().begin(m, Instant::now()).unwrap().unwrap()
    }

    #[test]
    fn reserve_claims_once() {
        let shared = SharedSession::new();
        let mut first = machine("a");

        let token = begin(&shared, &mut first);
        assert!(!token.is_cancelled());
        assert!(shared.is_generating());

        let err = shared.reserve().unwrap_err();
        assert_eq!(
            err,
            SessionError::AlreadyGenerating {
                active: JobHandle::new("a")
            }
        );
    }

    #[test]
    fn pending_reservation_blocks_others_until_dropped() {
        let shared = SharedSession::new();
        let reservation = shared.reserve().unwrap();
        assert_eq!(shared.reserve().unwrap_err(), SessionError::Submitting);

        drop(reservation);
        assert!(!shared.is_generating());
        let mut m = machine("a");
        assert!(!begin(&shared, &mut m).is_cancelled());
    }

    #[test]
    fn stop_during_submit_prevents_polling() {
        let shared = SharedSession::new();
        let reservation = shared.reserve().unwrap();
        assert!(shared.stop_generation().is_none());

        let mut m = machine("a");
        assert_eq!(reservation.begin(&mut m, Instant::now()).unwrap(), None);
        assert!(!shared.is_generating());
        assert!(shared.reserve().is_ok());
    }

    #[test]
    fn stale_reservation_drop_keeps_newer_claim() {
        let shared = SharedSession::new();
        let stale = shared.reserve().unwrap();
        shared.stop_generation();
        let fresh = shared.reserve().unwrap();

        drop(stale);
        assert_eq!(shared.reserve().unwrap_err(), SessionError::Submitting);
        drop(fresh);
        assert!(!shared.is_generating());
    }

    #[test]
    fn stop_generation_cancels_and_is_idempotent() {
        let shared = SharedSession::new();
        let mut m = machine("a");
        let token = begin(&shared, &mut m);

        let stopped = shared.stop_generation().unwrap();
        assert_eq!(stopped.job, JobHandle::new("a"));
        assert!(token.is_cancelled());
        assert!(!shared.is_generating());

        assert!(shared.stop_generation().is_none());
    }

    #[test]
    fn stop_effect_cancels_timer() {
        let shared = SharedSession::new();
        let mut m = machine("a");
        let token = begin(&shared, &mut m);

        let effects = shared.apply(&mut m, PollMsg::Stop);
        assert_eq!(effects, vec![PollEffect::StopTimer]);
        assert!(token.is_cancelled());
        assert!(!shared.is_generating());
    }
}
