use std::sync::{Arc, Mutex};

use carousel_core::{
    GenerationMode, GenerationRequest, PollContext, PollOutcome, PollSettings, SessionError,
};
use carousel_logging::{carousel_error, carousel_info};
use thiserror::Error;

use crate::poller::{GenerationEvent, HttpStatusSource, JobPoller, ProgressSink};
use crate::{GenerationClient, HistoryStore, RequestError, SharedSession};

/// Submit and status URLs of one generation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub submit: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTable {
    pub idea: Endpoints,
    pub script: Endpoints,
}

impl EndpointTable {
    pub fn for_mode(&self, mode: GenerationMode) -> &Endpoints {
        match mode {
            GenerationMode::Idea => &self.idea,
            GenerationMode::Script => &self.script,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to submit generation: {0}")]
    Submit(#[from] RequestError),
}

/// Submits generation requests and follows them to completion.
pub struct Generator {
    client: GenerationClient,
    endpoints: EndpointTable,
    session: SharedSession,
    history: Arc<Mutex<HistoryStore>>,
    poll: PollSettings,
}

impl Generator {
    pub fn new(
        client: GenerationClient,
        endpoints: EndpointTable,
        session: SharedSession,
        history: Arc<Mutex<HistoryStore>>,
        poll: PollSettings,
    ) -> Self {
        Self {
            client,
            endpoints,
            session,
            history,
            poll,
        }
    }

    /// Submits `request` in `mode` and polls the job until it ends.
    ///
    /// Refuses to start while another generation is reserved or active; the
    /// session is held from before the submit. A failed submit releases it.
    /// `Ok(None)` means the generation was stopped before it finished.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        mode: GenerationMode,
        sink: &dyn ProgressSink,
    ) -> Result<Option<PollOutcome>, GenerateError> {
        let reservation = self.session.reserve()?;

        let request = request.for_mode(mode);
        let endpoints = self.endpoints.for_mode(mode);
        carousel_info!("Starting {} generation", mode);
        let job = self
            .client
            .submit(&request, &endpoints.submit)
            .await
            .inspect_err(|err| carousel_error!("Submit failed: {}", err))?;
        sink.emit(GenerationEvent::Submitted {
            job: job.clone(),
            mode,
        });

        let source = Arc::new(HttpStatusSource::new(
            self.client.clone(),
            endpoints.status.clone(),
        ));
        let poller = JobPoller::new(
            source,
            self.session.clone(),
            self.history.clone(),
            self.poll.clone(),
        );
        let context = PollContext::new(job, mode, &request);
        Ok(poller.run_reserved(reservation, context, sink).await?)
    }
}
