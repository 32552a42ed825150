// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query surface of the authoritative backend used by badge aggregation.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CompassError;
use crate::types::{
    ChatMessage, ConversationKey, Counterpart, PendingFilter, ReadMarker, UserId, Viewer,
};

/// Read-only access to the rows badge aggregation needs.
///
/// Every method is a single round trip. Implementations must not swallow
/// failures: the aggregator relies on an `Err` to abort the whole pass.
#[async_trait]
pub trait BadgeSource: Send + Sync {
    /// People the viewer exchanges messages with, according to their role.
    async fn counterparts(&self, viewer: &Viewer) -> Result<Vec<Counterpart>, CompassError>;

    /// All messages tagged with any of `keys`, ordered by `created_at` ascending.
    async fn messages_for(
        &self,
        keys: &[ConversationKey],
    ) -> Result<Vec<ChatMessage>, CompassError>;

    /// Read markers of `reader` for `keys`. Keys without a marker are absent.
    async fn read_markers(
        &self,
        reader: &UserId,
        keys: &[ConversationKey],
    ) -> Result<HashMap<ConversationKey, ReadMarker>, CompassError>;

    /// Number of rows matching a pending-status filter.
    async fn count_pending(&self, filter: &PendingFilter) -> Result<u32, CompassError>;
}
