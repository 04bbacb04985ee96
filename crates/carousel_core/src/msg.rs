use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum PollMsg {
    /// Start of a poll cycle: the eager first cycle or a timer tick.
    Tick { now: Instant },
    /// Status endpoint answered with a JSON body.
    StatusReceived { body: Value, received_at: DateTime<Utc> },
    /// Status request failed after the retry primitive gave up.
    StatusFailed { reason: String },
    /// Caller abandoned the session.
    Stop,
}
