// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Compass.
//!
//! Implements [`ProviderAdapter`] over the streaming Messages API. Only
//! assistant text is surfaced; tool and thinking deltas are dropped.

pub mod client;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use compass_config::model::AnthropicConfig;
use compass_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderStreamChunk, StreamEventType,
};
use compass_core::{CompassError, PluginAdapter, ProviderAdapter, ProviderStream};
use futures::stream::StreamExt;
use tracing::info;

use crate::client::AnthropicClient;
use crate::sse::StreamEvent;
use crate::types::{ApiMessage, MessageRequest, SseDelta};

/// Environment variable consulted when the config carries no key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config, then `ANTHROPIC_API_KEY`. With neither
/// set, construction fails with [`CompassError::NotConfigured`].
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    pub fn new(config: &AnthropicConfig) -> Result<Self, CompassError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = AnthropicClient::new(
            &api_key,
            &config.api_version,
            config.default_model.clone(),
        )?;

        info!(model = %config.default_model, "Anthropic provider initialized");
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one pointed at a mock server.
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    fn to_message_request(&self, request: &ProviderRequest) -> MessageRequest {
        MessageRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.client.default_model().to_string()),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            system: request.system_prompt.clone(),
            max_tokens: request.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CompassError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CompassError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, CompassError> {
        let api_request = self.to_message_request(&request);
        let events = self.client.stream_message(&api_request).await?;

        let mut stop_reason: Option<String> = None;
        let chunks = events.filter_map(move |result| {
            let chunk = match result {
                Ok(event) => map_event(event, &mut stop_reason),
                Err(e) => Some(Err(e)),
            };
            async move { chunk }
        });

        Ok(Box::pin(chunks))
    }
}

/// Maps an SSE event to a chunk, remembering the stop reason announced by
/// `message_delta` so `message_stop` can carry it.
fn map_event(
    event: StreamEvent,
    stop_reason: &mut Option<String>,
) -> Option<Result<ProviderStreamChunk, CompassError>> {
    match event {
        StreamEvent::ContentBlockDelta(delta) => match delta.delta {
            SseDelta::TextDelta { text } => Some(Ok(ProviderStreamChunk::text_delta(text))),
            SseDelta::Other => None,
        },
        StreamEvent::MessageStart(_) => Some(Ok(ProviderStreamChunk {
            event_type: StreamEventType::MessageStart,
            text: None,
            error: None,
            stop_reason: None,
        })),
        StreamEvent::MessageDelta(md) => {
            if let Some(reason) = &md.delta.stop_reason {
                *stop_reason = Some(reason.clone());
            }
            Some(Ok(ProviderStreamChunk {
                event_type: StreamEventType::MessageDelta,
                text: None,
                error: None,
                stop_reason: md.delta.stop_reason,
            }))
        }
        StreamEvent::MessageStop => Some(Ok(ProviderStreamChunk::stop(stop_reason.clone()))),
        StreamEvent::Error(err) => Some(Ok(ProviderStreamChunk::error(format!(
            "{}: {}",
            err.error.type_, err.error.message
        )))),
        StreamEvent::Ping => None,
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, CompassError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(CompassError::NotConfigured {
            feature: "AI chat".to_string(),
        }),
    }
}
