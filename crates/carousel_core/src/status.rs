use carousel_logging::carousel_warn;
use serde_json::Value;

use crate::Slide;

/// Remote job status. The set is open: unknown strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    OutOfLimit,
    EmptyOutput,
    Other(String),
}

impl JobStatus {
    /// Maps the wire value. The service is inconsistent about casing and
    /// separators, so a few spellings are whitelisted.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => JobStatus::Pending,
            "PROCESSING" => JobStatus::Processing,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" | "Failed" => JobStatus::Failed,
            "OUT_OF_LIMIT" => JobStatus::OutOfLimit,
            "EMPTY OUTPUT" | "EMPTY_OUTPUT" => JobStatus::EmptyOutput,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, JobStatus::Other(_))
    }
}

/// One parsed status response.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusSnapshot {
    pub status: JobStatus,
    pub progress: Option<f64>,
    /// Raw `slides` field; only meaningful once the job is completed.
    pub slides: Option<Value>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl JobStatusSnapshot {
    /// Server-side failure text, preferring `error` over `message`.
    pub fn failure_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
    }

    /// Decodes the slide list. A missing or non-array field is no slides.
    pub fn decode_slides(&self) -> Result<Vec<Slide>, PayloadError> {
        match &self.slides {
            Some(items @ Value::Array(_)) => serde_json::from_value(items.clone())
                .map_err(|err| PayloadError::InvalidSlides(err.to_string())),
            _ => Ok(Vec::new()),
        }
    }

    /// Reported progress clamped to 0..=100 and truncated.
    pub fn clamped_progress(&self) -> Option<u8> {
        self.progress.map(|p| p.clamp(0.0, 100.0).trunc() as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid response format: {0}")]
    InvalidShape(String),
    #[error("missing status field in response")]
    MissingStatus,
    #[error("invalid slides in response: {0}")]
    InvalidSlides(String),
}

/// Interprets a status endpoint body.
///
/// An array yields its first element; an empty array means the job is not
/// visible yet and returns `Ok(None)`.
pub fn parse_job_response(body: &Value) -> Result<Option<JobStatusSnapshot>, PayloadError> {
    let record = match body {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Ok(None),
        },
        Value::Object(_) => body,
        other => return Err(PayloadError::InvalidShape(other.to_string())),
    };

    let Value::Object(fields) = record else {
        return Err(PayloadError::InvalidShape(record.to_string()));
    };

    let raw_status = fields
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(PayloadError::MissingStatus)?;
    let status = JobStatus::parse(raw_status);
    if !status.is_recognized() {
        carousel_warn!("Unknown job status: {}", raw_status);
    }

    Ok(Some(JobStatusSnapshot {
        status,
        progress: fields.get("progress").and_then(parse_progress),
        slides: fields.get("slides").cloned(),
        error: string_field(fields.get("error")),
        message: string_field(fields.get("message")),
    }))
}

fn parse_progress(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
