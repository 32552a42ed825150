// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for the streaming LLM behind the AI-chat proxy.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::CompassError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderStreamChunk};

/// Stream of chunks returned by [`ProviderAdapter::stream`].
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, CompassError>> + Send>>;

/// Adapter for LLM provider integrations.
///
/// `stream` resolves once the provider has accepted the request, so an `Err`
/// here means nothing was produced. Errors yielded by the stream itself happen
/// after output may already have been delivered.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, CompassError>;
}
