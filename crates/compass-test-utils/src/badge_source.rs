// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`BadgeSource`] with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use compass_core::types::{
    ChatMessage, ConversationKey, Counterpart, PendingFilter, ReadMarker, Role, UserId, Viewer,
};
use compass_core::{BadgeSource, CompassError};

#[derive(Default)]
struct State {
    counterparts: HashMap<UserId, Vec<Counterpart>>,
    messages: Vec<ChatMessage>,
    markers: HashMap<(UserId, ConversationKey), ReadMarker>,
    pending: HashMap<PendingFilter, u32>,
    failure: Option<String>,
}

/// Badge data held in memory.
///
/// While a failure is set every method returns a storage error, which lets
/// tests drive the aggregator and poller through their degraded paths.
#[derive(Default)]
pub struct InMemoryBadgeSource {
    state: Mutex<State>,
    counterpart_calls: AtomicUsize,
}

impl InMemoryBadgeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `counterpart` visible to `viewer`.
    pub async fn add_counterpart(&self, viewer: &UserId, counterpart: Counterpart) {
        self.state
            .lock()
            .await
            .counterparts
            .entry(viewer.clone())
            .or_default()
            .push(counterpart);
    }

    /// Records a message from `from` to `to` at `at`.
    pub async fn send(
        &self,
        from: &UserId,
        from_role: Role,
        to: &UserId,
        body: &str,
        at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        let id = format!("msg-{}", state.messages.len() + 1);
        state.messages.push(ChatMessage {
            id,
            conversation_key: ConversationKey::new(from, to),
            sender_id: from.clone(),
            sender_role: from_role,
            body: body.to_string(),
            created_at: at,
        });
    }

    /// Sets the read marker of `reader` for the thread with `other`.
    pub async fn mark_read(&self, reader: &UserId, other: &UserId, at: DateTime<Utc>) {
        let key = ConversationKey::new(reader, other);
        let mut state = self.state.lock().await;
        state
            .markers
            .entry((reader.clone(), key.clone()))
            .and_modify(|m| {
                m.advance(at);
            })
            .or_insert(ReadMarker {
                conversation_key: key,
                reader_id: reader.clone(),
                last_read_at: at,
            });
    }

    pub async fn set_pending(&self, filter: PendingFilter, count: u32) {
        self.state.lock().await.pending.insert(filter, count);
    }

    /// Makes every subsequent call fail with `message`.
    pub async fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().await.failure = Some(message.into());
    }

    /// Clears an injected failure.
    pub async fn recover(&self) {
        self.state.lock().await.failure = None;
    }

    /// Number of `counterparts` calls, one per aggregation pass.
    pub fn passes(&self) -> usize {
        self.counterpart_calls.load(Ordering::SeqCst)
    }
}

fn check(state: &State) -> Result<(), CompassError> {
    match &state.failure {
        Some(message) => Err(CompassError::storage(std::io::Error::other(message.clone()))),
        None => Ok(()),
    }
}

#[async_trait]
impl BadgeSource for InMemoryBadgeSource {
    async fn counterparts(&self, viewer: &Viewer) -> Result<Vec<Counterpart>, CompassError> {
        self.counterpart_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        check(&state)?;
        Ok(state
            .counterparts
            .get(&viewer.user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn messages_for(
        &self,
        keys: &[ConversationKey],
    ) -> Result<Vec<ChatMessage>, CompassError> {
        let state = self.state.lock().await;
        check(&state)?;
        let mut found: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|m| keys.contains(&m.conversation_key))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn read_markers(
        &self,
        reader: &UserId,
        keys: &[ConversationKey],
    ) -> Result<HashMap<ConversationKey, ReadMarker>, CompassError> {
        let state = self.state.lock().await;
        check(&state)?;
        Ok(keys
            .iter()
            .filter_map(|k| {
                state
                    .markers
                    .get(&(reader.clone(), k.clone()))
                    .map(|m| (k.clone(), m.clone()))
            })
            .collect())
    }

    async fn count_pending(&self, filter: &PendingFilter) -> Result<u32, CompassError> {
        let state = self.state.lock().await;
        check(&state)?;
        Ok(state.pending.get(filter).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn messages_filtered_by_key_and_sorted() {
        let source = InMemoryBadgeSource::new();
        let (a, b, c) = (UserId::new("a"), UserId::new("b"), UserId::new("c"));
        source.send(&b, Role::Counselor, &a, "second", at(20)).await;
        source.send(&a, Role::Student, &b, "first", at(10)).await;
        source.send(&c, Role::Counselor, &a, "other", at(5)).await;

        let found = source
            .messages_for(&[ConversationKey::new(&a, &b)])
            .await
            .unwrap();
        let bodies: Vec<_> = found.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second"]);
    }

    #[tokio::test]
    async fn mark_read_never_moves_back() {
        let source = InMemoryBadgeSource::new();
        let (a, b) = (UserId::new("a"), UserId::new("b"));
        source.mark_read(&a, &b, at(30)).await;
        source.mark_read(&a, &b, at(10)).await;
        let key = ConversationKey::new(&a, &b);
        let markers = source.read_markers(&a, &[key.clone()]).await.unwrap();
        assert_eq!(markers[&key].last_read_at, at(30));
    }

    #[tokio::test]
    async fn injected_failure_hits_every_method() {
        let source = InMemoryBadgeSource::new();
        source.fail_with("offline").await;
        let viewer = Viewer::new(UserId::new("a"), Role::Parent, None);
        assert!(source.counterparts(&viewer).await.is_err());
        assert!(
            source
                .count_pending(&PendingFilter::AssignedTasks {
                    assignee_id: UserId::new("a")
                })
                .await
                .is_err()
        );
        source.recover().await;
        assert!(source.counterparts(&viewer).await.is_ok());
        assert_eq!(source.passes(), 2);
    }
}
