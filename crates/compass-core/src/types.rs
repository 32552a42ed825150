// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across Compass crates.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Separator between the two participant ids of a [`ConversationKey`].
pub const CONVERSATION_KEY_SEPARATOR: &str = "__";

/// Unique identifier for a user (student, counselor, teacher or parent).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a school.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchoolId(pub String);

impl SchoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application role of a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Student,
    Counselor,
    Teacher,
    Parent,
}

/// The signed-in user as seen by every data-driven view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: UserId,
    pub role: Role,
    /// School the user belongs to. Parents and students created before
    /// school assignment may not have one yet.
    #[serde(default)]
    pub school_id: Option<SchoolId>,
}

impl Viewer {
    pub fn new(user_id: UserId, role: Role, school_id: Option<SchoolId>) -> Self {
        Self {
            user_id,
            role,
            school_id,
        }
    }
}

/// Order-independent identifier of a two-party message thread.
///
/// Both participants compute the same key: the ids are sorted and joined
/// with [`CONVERSATION_KEY_SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!(
            "{}{CONVERSATION_KEY_SEPARATOR}{}",
            first.as_str(),
            second.as_str()
        ))
    }

    /// Wraps a key read back from storage without recomputing it.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single message in a two-party thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_key: ConversationKey,
    pub sender_id: UserId,
    pub sender_role: Role,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Timestamp of the last message a reader acknowledged in one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadMarker {
    pub conversation_key: ConversationKey,
    pub reader_id: UserId,
    pub last_read_at: DateTime<Utc>,
}

impl ReadMarker {
    /// Moves the marker forward. Earlier timestamps are ignored so the marker
    /// never goes backwards. Returns whether the marker changed.
    pub fn advance(&mut self, read_at: DateTime<Utc>) -> bool {
        if read_at > self.last_read_at {
            self.last_read_at = read_at;
            true
        } else {
            false
        }
    }
}

/// Someone the viewer can exchange messages with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub user_id: UserId,
    pub role: Role,
}

/// Navigation entries that can carry a badge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NavDestination {
    Messages,
    Approvals,
    Tasks,
    Referrals,
    Meetings,
}

/// Per-destination counts of items needing the viewer's attention.
///
/// Zero counts are never stored: a destination is either absent (no badge)
/// or carries a positive count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeCounts(BTreeMap<NavDestination, u32>);

impl BadgeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the count for a destination, removing the badge when zero.
    pub fn set(&mut self, destination: NavDestination, count: u32) {
        if count == 0 {
            self.0.remove(&destination);
        } else {
            self.0.insert(destination, count);
        }
    }

    pub fn get(&self, destination: NavDestination) -> Option<u32> {
        self.0.get(&destination).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|&c| u64::from(c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NavDestination, u32)> + '_ {
        self.0.iter().map(|(d, c)| (*d, *c))
    }
}

/// A status-flag count query for one pending-work badge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingFilter {
    /// Users of `role` at the school still awaiting approval.
    UserApprovals { school_id: SchoolId, role: Role },
    /// Pending tasks assigned to one counselor.
    AssignedTasks { assignee_id: UserId },
    /// Referrals at the school not yet picked up by a counselor.
    SchoolReferrals { school_id: SchoolId },
    /// Referrals submitted by one teacher that are still pending.
    SubmittedReferrals { submitted_by: UserId },
    /// Meeting requests addressed to a counselor awaiting a decision.
    MeetingRequests { counselor_id: UserId },
    /// Meeting proposals sent to a student awaiting the student's answer.
    MeetingResponses { student_id: UserId },
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
}

// --- Provider types ---

/// Speaker of a chat turn sent to the LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the conversation forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A streaming request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model override; `None` uses the provider's default model.
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
}

/// Kind of event carried by a [`ProviderStreamChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    MessageStart,
    TextDelta,
    MessageDelta,
    MessageStop,
    Error,
}

/// A single chunk from a streaming LLM provider response.
#[derive(Debug, Clone)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    /// Assistant text, set on [`StreamEventType::TextDelta`].
    pub text: Option<String>,
    /// Provider-reported error, set on [`StreamEventType::Error`].
    pub error: Option<String>,
    pub stop_reason: Option<String>,
}

impl ProviderStreamChunk {
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::TextDelta,
            text: Some(text.into()),
            error: None,
            stop_reason: None,
        }
    }

    pub fn stop(stop_reason: Option<String>) -> Self {
        Self {
            event_type: StreamEventType::MessageStop,
            text: None,
            error: None,
            stop_reason,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Error,
            text: None,
            error: Some(message.into()),
            stop_reason: None,
        }
    }
}
