// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` by replaying a [`MockScript`],
//! enabling fast gateway tests without external API calls.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use compass_core::types::{AdapterType, HealthStatus, ProviderRequest, ProviderStreamChunk};
use compass_core::{CompassError, PluginAdapter, ProviderAdapter, ProviderStream};

/// What a [`MockProvider`] does when asked to stream.
#[derive(Debug, Clone)]
pub enum MockScript {
    /// Emit each string as a text delta, then a stop event.
    Text(Vec<String>),
    /// Refuse the request before any output is produced.
    FailBeforeStream(String),
    /// Emit the given deltas, then yield an error from the stream.
    FailMidStream { deltas: Vec<String>, error: String },
    /// Emit the given deltas, then never yield again.
    Stall(Vec<String>),
}

/// A mock LLM provider replaying a fixed script for every request.
///
/// Every request is recorded so tests can inspect the system prompt and the
/// forwarded messages.
pub struct MockProvider {
    script: MockScript,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider that answers with the given text deltas.
    pub fn with_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MockScript::Text(deltas.into_iter().map(Into::into).collect()))
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    /// The most recent request, if any.
    pub async fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().await.last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::with_deltas(["mock response"])
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
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
impl ProviderAdapter for MockProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, CompassError> {
        self.requests.lock().await.push(request);

        let deltas = |ds: &[String]| -> Vec<Result<ProviderStreamChunk, CompassError>> {
            ds.iter()
                .map(|d| Ok(ProviderStreamChunk::text_delta(d.clone())))
                .collect()
        };

        match &self.script {
            MockScript::Text(ds) => {
                let mut items = deltas(ds);
                items.push(Ok(ProviderStreamChunk::stop(Some("end_turn".to_string()))));
                Ok(Box::pin(stream::iter(items)))
            }
            MockScript::FailBeforeStream(message) => Err(CompassError::Provider {
                message: message.clone(),
                source: None,
            }),
            MockScript::FailMidStream { deltas: ds, error } => {
                let mut items = deltas(ds);
                items.push(Err(CompassError::Provider {
                    message: error.clone(),
                    source: None,
                }));
                Ok(Box::pin(stream::iter(items)))
            }
            MockScript::Stall(ds) => {
                Ok(Box::pin(stream::iter(deltas(ds)).chain(stream::pending())))
            }
        }
    }
}
