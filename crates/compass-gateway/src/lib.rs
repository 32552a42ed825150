// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Compass.
//!
//! Exposes the streaming AI-chat proxy in front of a [`ProviderAdapter`]
//! and an unauthenticated liveness endpoint.
//!
//! [`ProviderAdapter`]: compass_core::ProviderAdapter

pub mod handlers;
pub mod prompt;
pub mod server;

pub use prompt::{DEFAULT_SYSTEM_PROMPT, SystemPrompt, UserContext};
pub use server::{GatewayState, ServerConfig, build_router, start_server};
