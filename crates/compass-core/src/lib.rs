// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Compass.
//!
//! Holds the workspace error type, the domain types shared by the cache,
//! badge and chat crates, and the trait seams their backends implement.

pub mod error;
pub mod traits;
pub mod types;

pub use error::CompassError;
pub use types::{
    AdapterType, BadgeCounts, ChatMessage, ChatRole, ConversationKey, Counterpart, HealthStatus,
    NavDestination, PendingFilter, ProviderMessage, ProviderRequest, ProviderStreamChunk,
    ReadMarker, Role, SchoolId, StreamEventType, UserId, Viewer,
};

pub use traits::{BadgeSource, PluginAdapter, ProviderAdapter, ProviderStream};
