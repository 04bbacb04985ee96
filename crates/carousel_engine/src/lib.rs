//! Carousel engine: network, storage and the async drivers around the core state machine.
mod client;
mod download;
mod generator;
mod history_store;
mod persist;
mod poller;
mod preferences;
mod retry;
mod session;
mod storage;
mod types;

pub use client::{extract_job_id, ClientSettings, GenerationClient};
pub use download::{download_slides, DownloadError, DownloadReport};
pub use generator::{EndpointTable, Endpoints, GenerateError, Generator};
pub use history_store::{HistorySettings, HistoryStore, SaveOutcome, HISTORY_KEY};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use poller::{GenerationEvent, HttpStatusSource, JobPoller, ProgressSink, StatusSource};
pub use preferences::{load_dark_mode, save_dark_mode, DARK_MODE_KEY};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use session::{Reservation, SharedSession};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::{FailureKind, RequestError};
