// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Handles POST /api/chat and GET /health.

use std::str::FromStr;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use compass_core::types::{
    ChatRole, ProviderMessage, ProviderRequest, ProviderStreamChunk, StreamEventType,
};
use compass_core::{CompassError, ProviderStream};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::prompt::UserContext;
use crate::server::GatewayState;

/// Request body for POST /api/chat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub user_context: Option<UserContext>,
}

/// One chat turn as sent by the client. The role is checked after parsing
/// so a bad role yields a descriptive 400.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Whether POST /api/chat has a provider behind it.
    pub chat_configured: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Parses and checks a chat body, returning the provider turns.
pub fn parse_chat_request(
    body: &[u8],
) -> Result<(Vec<ProviderMessage>, Option<UserContext>), String> {
    let request: ChatRequest =
        serde_json::from_slice(body).map_err(|e| format!("invalid request body: {e}"))?;

    if request.messages.is_empty() {
        return Err("messages must not be empty".to_string());
    }

    let messages = request
        .messages
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let role = ChatRole::from_str(&m.role).map_err(|_| {
                format!(
                    "messages[{i}].role must be \"user\" or \"assistant\", got {:?}",
                    m.role
                )
            })?;
            if m.content.trim().is_empty() {
                return Err(format!("messages[{i}].content must not be empty"));
            }
            Ok(ProviderMessage {
                role,
                content: m.content,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok((messages, request.user_context))
}

/// What one provider chunk means for the relayed body.
enum Relay {
    Text(String),
    Skip,
    Fail(String),
}

fn classify(item: Result<ProviderStreamChunk, CompassError>) -> Relay {
    match item {
        Ok(chunk) => match chunk.event_type {
            StreamEventType::TextDelta => match chunk.text {
                Some(text) if !text.is_empty() => Relay::Text(text),
                _ => Relay::Skip,
            },
            StreamEventType::Error => {
                Relay::Fail(chunk.error.unwrap_or_else(|| "provider error".to_string()))
            }
            _ => Relay::Skip,
        },
        Err(e) => Relay::Fail(e.to_string()),
    }
}

/// Reads until the first text delta so failures that happen before any
/// output can still be reported with a status code.
///
/// `Ok(None)` means the stream finished without producing text.
async fn first_text(stream: &mut ProviderStream) -> Result<Option<String>, String> {
    while let Some(item) = stream.next().await {
        match classify(item) {
            Relay::Text(text) => return Ok(Some(text)),
            Relay::Skip => {}
            Relay::Fail(message) => return Err(message),
        }
    }
    Ok(None)
}

/// POST /api/chat
///
/// Streams the assistant reply as raw UTF-8 text. A failure after the first
/// byte aborts the body; text already sent stays sent.
pub async fn post_chat(State(state): State<GatewayState>, body: Bytes) -> Response {
    let Some(provider) = state.provider.clone() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "AI chat is not configured");
    };

    let (messages, user_context) = match parse_chat_request(&body) {
        Ok(parsed) => parsed,
        Err(message) => {
            debug!(error = %message, "rejected chat request");
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    let request = ProviderRequest {
        model: None,
        system_prompt: Some(state.prompt.personalize(user_context.as_ref())),
        messages,
        max_tokens: state.max_tokens,
    };

    let mut upstream = match provider.stream(request).await {
        Ok(stream) => stream,
        Err(e) if e.is_not_configured() => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
        }
        Err(e) => {
            error!(error = %e, "chat provider rejected request");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "AI provider request failed");
        }
    };

    let first = match first_text(&mut upstream).await {
        Ok(first) => first,
        Err(message) => {
            error!(error = %message, "chat stream failed before output");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "AI provider request failed");
        }
    };

    let rest = upstream.filter_map(|item| async move {
        match classify(item) {
            Relay::Text(text) => Some(Ok(Bytes::from(text))),
            Relay::Skip => None,
            Relay::Fail(message) => {
                warn!(error = %message, "chat stream failed mid-response");
                Some(Err(std::io::Error::other(message)))
            }
        }
    });

    let body = stream::iter(first.map(|text| Ok::<_, std::io::Error>(Bytes::from(text))))
        .chain(rest)
        .take_until(state.shutdown.clone().cancelled_owned());

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        chat_configured: state.provider.is_some(),
    })
}
