use std::future::Future;
use std::time::Duration;

use carousel_logging::carousel_warn;
use serde_json::Value;

use crate::{FailureKind, RequestError};

/// Attempt ceiling and back-off base for remote calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Sends a request up to `policy.max_attempts` times.
///
/// Connection failures and timeouts back off exponentially between attempts.
/// Non-2xx responses are re-sent without delay and only become an
/// [`FailureKind::HttpStatus`] error on the last attempt. Any other error is
/// returned at once.
pub async fn retry_with_backoff<F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut send: F,
) -> Result<reqwest::Response, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let last = attempt + 1 >= attempts;
        match send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                if last {
                    return Err(http_status_error(response).await);
                }
                carousel_warn!(
                    "[Retry {}/{}] {} returned {}, retrying",
                    attempt + 1,
                    attempts,
                    label,
                    response.status()
                );
            }
            Err(err) => {
                let error = map_reqwest_error(err);
                if last || !error.is_transient() {
                    return Err(error);
                }
                let delay = policy.delay_for(attempt);
                carousel_warn!(
                    "[Retry {}/{}] {} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    attempts,
                    label,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return RequestError::new(FailureKind::InvalidUrl, err.to_string());
    }
    RequestError::new(FailureKind::Network, err.to_string())
}

/// Builds the error for a non-2xx response, preferring the server's `message`.
async fn http_status_error(response: reqwest::Response) -> RequestError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or_else(|| status.to_string());
    RequestError::new(FailureKind::HttpStatus(status.as_u16()), message)
}

fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let record = match &value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    record
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
