// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Handles authentication headers, request dispatch and a single retry on
//! transient statuses. Retries only happen before a stream is handed out.

use std::time::Duration;

use compass_core::CompassError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::sse::{self, EventStream};
use crate::types::{ApiErrorResponse, MessageRequest};

/// Messages API endpoint.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    default_model: String,
    max_retries: u32,
    retry_delay: Duration,
    base_url: String,
}

impl AnthropicClient {
    /// Builds a client sending `api_key` and `api_version` on every request.
    ///
    /// Only connection setup has a timeout. An accepted stream may run as
    /// long as the provider keeps producing.
    pub fn new(api_key: &str, api_version: &str, model: String) -> Result<Self, CompassError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| CompassError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version).map_err(|e| {
                CompassError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CompassError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            default_model: model,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
            base_url: API_BASE_URL.to_string(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Points the client at another endpoint, such as a local mock server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends a streaming request and returns the SSE event stream.
    ///
    /// On 429, 500, 503 or 529 the request is sent once more after
    /// `retry_delay`.
    pub async fn stream_message(&self, request: &MessageRequest) -> Result<EventStream, CompassError> {
        let mut req = request.clone();
        req.stream = true;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying chat stream request");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(&req)
                .send()
                .await
                .map_err(|e| CompassError::Provider {
                    message: format!("request to Anthropic failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "streaming response received");

            if status.is_success() {
                return Ok(sse::parse_sse_stream(response));
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "upstream returned a retryable status");
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "Anthropic API error ({}): {}",
                    api_err.error.type_, api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(CompassError::Provider {
                message,
                source: None,
            });
        }

        Err(CompassError::Provider {
            message: "chat stream request failed after retry".into(),
            source: None,
        })
    }
}

/// HTTP statuses worth one retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_OK: &str = "event: message_stop\ndata: {}\n\n";

    fn test_client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new("test-api-key", "2023-06-01", "claude-sonnet-4-20250514".into())
            .unwrap()
            .with_base_url(base_url)
            .with_retry_delay(Duration::from_millis(10))
    }

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Hello".into(),
            }],
            system: None,
            max_tokens: 1024,
            stream: false,
        }
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body.to_string())
    }

    #[test]
    fn transient_statuses() {
        for code in [429, 500, 503, 529] {
            assert!(is_transient_error(reqwest::StatusCode::from_u16(code).unwrap()));
        }
        assert!(!is_transient_error(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_transient_error(reqwest::StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn rejects_unprintable_api_key() {
        let err = AnthropicClient::new("bad\nkey", "2023-06-01", "m".into()).unwrap_err();
        assert!(matches!(err, CompassError::Config(_)));
    }

    #[tokio::test]
    async fn sends_headers_and_stream_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(sse(SSE_OK))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).stream_message(&test_request()).await;
        assert!(result.is_ok(), "headers should match: {:?}", result.err());
    }

    #[tokio::test]
    async fn retries_once_on_529() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(sse(SSE_OK))
            .mount(&server)
            .await;

        assert!(test_client(&server.uri()).stream_message(&test_request()).await.is_ok());
    }

    #[tokio::test]
    async fn gives_up_after_second_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "Service overloaded"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn does_not_retry_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .stream_message(&test_request())
            .await
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("400"), "got: {err}");
    }
}
