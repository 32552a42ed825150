// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use compass_config::model::GatewayConfig;
use compass_core::{CompassError, ProviderAdapter};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::prompt::SystemPrompt;

/// State behind the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// `None` when no provider credentials are configured.
    pub provider: Option<Arc<dyn ProviderAdapter>>,
    pub prompt: Arc<SystemPrompt>,
    /// Token budget per chat completion.
    pub max_tokens: u32,
    /// Cancelled on server shutdown; ends every in-flight relay.
    pub shutdown: CancellationToken,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(
        provider: Option<Arc<dyn ProviderAdapter>>,
        prompt: SystemPrompt,
        max_tokens: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            prompt: Arc::new(prompt),
            max_tokens,
            shutdown,
            health: HealthState {
                start_time: Instant::now(),
            },
        }
    }
}

/// Bind address of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// All gateway routes:
/// - POST /api/chat
/// - GET /health
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::post_chat))
        .route("/health", get(handlers::get_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until the state's shutdown token is cancelled.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), CompassError> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CompassError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| CompassError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_gateway_config() {
        let config = ServerConfig::from(&GatewayConfig::default());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
    }

    #[tokio::test]
    async fn server_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let state = GatewayState::new(None, SystemPrompt::default(), 64, shutdown.clone());
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        };
        let server = tokio::spawn(async move { start_server(&config, state).await });
        shutdown.cancel();
        let result = server.await.unwrap();
        assert!(result.is_ok());
    }
}
