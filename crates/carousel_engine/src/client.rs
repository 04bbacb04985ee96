use std::time::Duration;

use bytes::{Bytes, BytesMut};
use carousel_core::{GenerationRequest, JobHandle};
use carousel_logging::{carousel_debug, carousel_info};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;

use crate::retry::{map_reqwest_error, retry_with_backoff};
use crate::{FailureKind, RequestError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_download_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_download_bytes: 25 * 1024 * 1024,
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP side of the generation service: submit, status and slide download.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl GenerationClient {
    pub fn new(settings: ClientSettings) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RequestError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { http, settings })
    }

    /// Posts `request` and returns the job handle the service assigned.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        endpoint: &str,
    ) -> Result<JobHandle, RequestError> {
        let url = parse_url(endpoint)?;
        let body = serde_json::to_vec(request)
            .map_err(|err| RequestError::new(FailureKind::InvalidPayload, err.to_string()))?;
        carousel_debug!("Submitting generation request to {}", url);

        let response = retry_with_backoff(&self.settings.retry, "submit", || {
            self.http
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
        })
        .await?;

        let value = read_json(response).await?;
        let job = extract_job_id(&value).ok_or_else(|| {
            RequestError::new(
                FailureKind::MissingJobId,
                format!("no job id received, response: {value}"),
            )
        })?;
        carousel_info!("Generation submitted, job {}", job);
        Ok(job)
    }

    /// Queries `endpoint?jobId=<job>` and returns the raw JSON body.
    pub async fn fetch_status(
        &self,
        endpoint: &str,
        job: &JobHandle,
    ) -> Result<Value, RequestError> {
        let mut url = parse_url(endpoint)?;
        url.query_pairs_mut().append_pair("jobId", job.as_str());

        let response = retry_with_backoff(&self.settings.retry, "status", || {
            self.http.get(url.clone()).send()
        })
        .await?;
        read_json(response).await
    }

    /// Fetches a slide image, refusing bodies over the configured size.
    pub async fn download(&self, url: &str) -> Result<Bytes, RequestError> {
        let url = parse_url(url)?;
        let max_bytes = self.settings.max_download_bytes;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("download failed with status {status}"),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(too_large(max_bytes, Some(content_len)));
            }
        }

        let mut bytes = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(max_bytes, Some(next_len)));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes.freeze())
    }
}

/// Reads the job id from a submit response.
///
/// The service answers with either an object or a one-element array and
/// names the field `jobId` or `job_id`; both are accepted.
pub fn extract_job_id(value: &Value) -> Option<JobHandle> {
    let record = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    ["jobId", "job_id"]
        .iter()
        .find_map(|key| match record.get(key)? {
            Value::String(id) if !id.is_empty() => Some(JobHandle::new(id.clone())),
            Value::Number(id) => Some(JobHandle::new(id.to_string())),
            _ => None,
        })
}

fn parse_url(raw: &str) -> Result<Url, RequestError> {
    Url::parse(raw).map_err(|err| RequestError::new(FailureKind::InvalidUrl, err.to_string()))
}

async fn read_json(response: reqwest::Response) -> Result<Value, RequestError> {
    let status = response.status();
    let text = response.text().await.map_err(map_reqwest_error)?;
    serde_json::from_str(&text).map_err(|err| {
        RequestError::new(
            FailureKind::InvalidPayload,
            format!("failed to parse response (status {status}): {err}"),
        )
    })
}

fn too_large(max_bytes: u64, actual: Option<u64>) -> RequestError {
    RequestError::new(
        FailureKind::TooLarge { max_bytes, actual },
        "response too large",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_id_accepts_both_field_names() {
        assert_eq!(
            extract_job_id(&json!({"jobId": "x123"})),
            Some(JobHandle::new("x123"))
        );
        assert_eq!(
            extract_job_id(&json!({"job_id": "x123"})),
            Some(JobHandle::new("x123"))
        );
        assert_eq!(
            extract_job_id(&json!([{"job_id": 77}])),
            Some(JobHandle::new("77"))
        );
    }

    #[test]
    fn job_id_missing_or_blank_is_none() {
        assert_eq!(extract_job_id(&json!({"id": "x"})), None);
        assert_eq!(extract_job_id(&json!({"jobId": ""})), None);
        assert_eq!(extract_job_id(&json!([])), None);
        assert_eq!(extract_job_id(&json!("x123")), None);
    }
}
