//! Carousel core: pure data model, response parsing and the polling state machine.
mod effect;
mod history;
mod msg;
mod recency;
mod request;
mod session;
mod slide;
mod state;
mod status;
mod update;

pub use effect::{PollEffect, PollOutcome};
pub use history::{
    preview_prompt, History, HistoryEntry, DEGRADED_HISTORY_CAPACITY, HISTORY_CAPACITY,
    PROMPT_PREVIEW_CHARS,
};
pub use msg::PollMsg;
pub use recency::{group_by_recency, RecencyBucket};
pub use request::{GenerationMode, GenerationRequest, RequestValidationError, DEFAULT_CREATOR_NAME};
pub use session::{ActiveGeneration, GenerationSession, JobHandle, SessionError};
pub use slide::Slide;
pub use state::{PollContext, PollSettings, PollState};
pub use status::{parse_job_response, JobStatus, JobStatusSnapshot, PayloadError};
pub use update::PollMachine;
