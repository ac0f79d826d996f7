//! Shared HTTP plumbing for the chart feed and metadata service.
//!
//! Every outbound call goes through [`send_with_retry`], which applies the
//! same policy to both services:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors (including timeouts) → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Retries exhausted or a non-retryable status become
//! [`PipelineError::ExternalService`].

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Build a client with a bounded per-request timeout.
pub fn build_client(timeout_secs: u64) -> PipelineResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("chartdiff/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PipelineError::external("http", e.to_string()))
}

/// Send a request, retrying transient failures with exponential backoff.
///
/// `make_request` is called once per attempt because a `RequestBuilder`
/// cannot be reused after sending. A successful response (2xx) is returned
/// as-is; a 404 is returned too so callers can treat "not found" as data.
pub async fn send_with_retry<F>(
    service: &str,
    max_retries: u32,
    mut make_request: F,
) -> PipelineResult<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            debug!(service, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status == StatusCode::NOT_FOUND {
                    return Ok(response);
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = PipelineError::external(service, format!("HTTP {}: {}", status, body_text));

                if is_retryable(status) {
                    warn!(service, %status, "transient service error");
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                warn!(service, error = %e, "request failed");
                last_err = Some(PipelineError::external(service, e.to_string()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PipelineError::external(service, "request failed after retries")))
}

/// Decode a JSON body, mapping failures to a service error.
pub async fn json_body(service: &str, response: Response) -> PipelineResult<serde_json::Value> {
    response
        .json()
        .await
        .map_err(|e| PipelineError::external(service, format!("invalid JSON body: {}", e)))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(12), Duration::from_secs(32));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }
}
