// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `compass serve`: the HTTP gateway.

use std::sync::Arc;

use compass_anthropic::AnthropicProvider;
use compass_config::CompassConfig;
use compass_core::{CompassError, PluginAdapter, ProviderAdapter};
use compass_gateway::{GatewayState, ServerConfig, SystemPrompt, start_server};
use tracing::{info, warn};

use crate::shutdown::install_signal_handler;

/// Builds the provider, or `None` when no API key is available.
///
/// A missing key is not fatal: the gateway still serves health checks and
/// answers chat requests with 503.
pub fn init_provider(
    config: &CompassConfig,
) -> Result<Option<Arc<dyn ProviderAdapter>>, CompassError> {
    match AnthropicProvider::new(&config.anthropic) {
        Ok(provider) => Ok(Some(Arc::new(provider))),
        Err(e) if e.is_not_configured() => {
            warn!("no Anthropic API key configured, AI chat disabled");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Runs the gateway until SIGINT or SIGTERM.
pub async fn run_serve(config: CompassConfig) -> Result<(), CompassError> {
    info!("starting compass serve");

    let provider = init_provider(&config)?;
    let prompt = SystemPrompt::load(&config.chat).await;
    let shutdown = install_signal_handler();

    let state = GatewayState::new(
        provider.clone(),
        prompt,
        config.anthropic.max_tokens,
        shutdown,
    );
    start_server(&ServerConfig::from(&config.gateway), state).await?;

    if let Some(provider) = provider {
        provider.shutdown().await?;
    }
    info!("compass serve stopped");
    Ok(())
}
