// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache-then-revalidate view controller.
//!
//! A view is seeded synchronously from the cache store, then reconciled
//! against the authoritative source. The server result always wins, and
//! state is written back to the cache whenever it changes once the view has
//! either a warm cache or a server load behind it.

use std::sync::Arc;

use async_trait::async_trait;
use compass_core::{CompassError, UserId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::key::CacheKey;
use crate::store::CacheStore;

/// Who a view is showing data for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewIdentity {
    pub user_id: UserId,
    /// Narrower partition within the user, e.g. one conversation.
    pub scope: Option<String>,
}

impl ViewIdentity {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            scope: None,
        }
    }

    pub fn scoped(user_id: UserId, scope: impl Into<String>) -> Self {
        Self {
            user_id,
            scope: Some(scope.into()),
        }
    }
}

/// Authoritative source for one view's data.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self, identity: &ViewIdentity) -> Result<T, CompassError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Uninitialized,
    Hydrating,
    HydratedFromCache,
    HydratedEmpty,
    Reconciling,
    Settled,
}

/// Proof that a reconciliation was started for a particular identity.
#[derive(Debug, Clone)]
pub struct ReconcileTicket {
    generation: u64,
    identity: ViewIdentity,
}

impl ReconcileTicket {
    pub fn identity(&self) -> &ViewIdentity {
        &self.identity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Server data replaced the view state.
    Applied,
    /// The identity changed while the fetch was in flight.
    Discarded,
}

/// State holder for one data-driven view.
pub struct ViewController<T> {
    store: Arc<CacheStore>,
    app: String,
    view: String,
    ttl_ms: u64,

    identity: Option<ViewIdentity>,
    key: Option<CacheKey>,
    generation: u64,

    phase: ViewPhase,
    data: Option<T>,
    is_stale: bool,
    has_warm_cache: bool,
    has_loaded_from_server: bool,
    last_error: Option<String>,
}

impl<T> ViewController<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(
        store: Arc<CacheStore>,
        app: impl Into<String>,
        view: impl Into<String>,
        ttl_ms: u64,
    ) -> Self {
        Self {
            store,
            app: app.into(),
            view: view.into(),
            ttl_ms,
            identity: None,
            key: None,
            generation: 0,
            phase: ViewPhase::Uninitialized,
            data: None,
            is_stale: true,
            has_warm_cache: false,
            has_loaded_from_server: false,
            last_error: None,
        }
    }

    /// Hydrates the view for `identity` from the cache.
    ///
    /// Re-activating with the current identity is a no-op. A different
    /// identity resets the view first, which also invalidates any
    /// outstanding [`ReconcileTicket`].
    pub fn activate(&mut self, identity: ViewIdentity) -> Result<(), CompassError> {
        if self.identity.as_ref() == Some(&identity) && self.phase != ViewPhase::Uninitialized {
            return Ok(());
        }

        self.reset();
        let key = CacheKey::new(
            &self.app,
            &self.view,
            &identity.user_id,
            identity.scope.as_deref(),
        )
        .map_err(|e| CompassError::InvalidInput(e.to_string()))?;

        self.phase = ViewPhase::Hydrating;

        let read = self.store.read::<T>(&key, self.ttl_ms);
        self.is_stale = read.is_stale;
        match read.data {
            Some(data) if read.found => {
                self.data = Some(data);
                self.has_warm_cache = true;
                self.phase = ViewPhase::HydratedFromCache;
            }
            _ => {
                self.phase = ViewPhase::HydratedEmpty;
            }
        }
        debug!(key = %key, phase = ?self.phase, stale = self.is_stale, "view hydrated");

        self.identity = Some(identity);
        self.key = Some(key);
        Ok(())
    }

    /// Returns the view to `Uninitialized`, dropping its state.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.identity = None;
        self.key = None;
        self.phase = ViewPhase::Uninitialized;
        self.data = None;
        self.is_stale = true;
        self.has_warm_cache = false;
        self.has_loaded_from_server = false;
        self.last_error = None;
    }

    /// Marks the start of an authoritative fetch. `None` before activation.
    pub fn begin_reconcile(&mut self) -> Option<ReconcileTicket> {
        let identity = self.identity.clone()?;
        self.phase = ViewPhase::Reconciling;
        Some(ReconcileTicket {
            generation: self.generation,
            identity,
        })
    }

    /// Applies the result of the fetch started with `ticket`.
    ///
    /// A fetch error leaves the seeded data in place, records the error and
    /// is returned to the caller.
    pub fn complete_reconcile(
        &mut self,
        ticket: ReconcileTicket,
        result: Result<T, CompassError>,
    ) -> Result<ReconcileOutcome, CompassError> {
        if ticket.generation != self.generation {
            debug!(view = %self.view, "discarding reconcile result for a previous identity");
            return Ok(ReconcileOutcome::Discarded);
        }

        self.phase = ViewPhase::Settled;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.is_stale = false;
                self.has_loaded_from_server = true;
                self.last_error = None;
                self.write_back();
                Ok(ReconcileOutcome::Applied)
            }
            Err(e) => {
                warn!(view = %self.view, error = %e, "authoritative fetch failed, keeping cached state");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetches from `fetcher` and applies the result.
    pub async fn reconcile(
        &mut self,
        fetcher: &dyn Fetcher<T>,
    ) -> Result<ReconcileOutcome, CompassError> {
        let ticket = self
            .begin_reconcile()
            .ok_or_else(|| CompassError::Internal("reconcile before activate".to_string()))?;
        let result = fetcher.fetch(ticket.identity()).await;
        self.complete_reconcile(ticket, result)
    }

    /// Applies a local mutation, such as an optimistic append.
    pub fn update(&mut self, mutate: impl FnOnce(&mut Option<T>)) {
        mutate(&mut self.data);
        self.write_back();
    }

    fn write_back(&self) {
        if !(self.has_warm_cache || self.has_loaded_from_server) {
            return;
        }
        if let (Some(key), Some(data)) = (&self.key, &self.data) {
            self.store.write(key, data);
        }
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    pub fn has_warm_cache(&self) -> bool {
        self.has_warm_cache
    }

    pub fn has_loaded_from_server(&self) -> bool {
        self.has_loaded_from_server
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn identity(&self) -> Option<&ViewIdentity> {
        self.identity.as_ref()
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backend::{KvBackend, MemoryBackend};
    use crate::clock::ManualClock;
    use crate::envelope::CacheEnvelope;

    const NOW: i64 = 1_700_000_000_000;
    const TTL: u64 = 120_000;

    struct StaticFetcher(Mutex<Option<Result<Vec<String>, CompassError>>>);

    impl StaticFetcher {
        fn ok(items: &[&str]) -> Self {
            Self(Mutex::new(Some(Ok(items.iter().map(|s| s.to_string()).collect()))))
        }

        fn err(message: &str) -> Self {
            Self(Mutex::new(Some(Err(CompassError::Internal(message.into())))))
        }
    }

    #[async_trait]
    impl Fetcher<Vec<String>> for StaticFetcher {
        async fn fetch(&self, _identity: &ViewIdentity) -> Result<Vec<String>, CompassError> {
            self.0
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(CompassError::Internal("fetched twice".into())))
        }
    }

    struct Harness {
        store: Arc<CacheStore>,
        backend: Arc<MemoryBackend>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            let backend = Arc::new(MemoryBackend::new());
            let clock = Arc::new(ManualClock::new(NOW));
            let store = Arc::new(CacheStore::new(backend.clone(), clock.clone()));
            Self {
                store,
                backend,
                clock,
            }
        }

        fn controller(&self) -> ViewController<Vec<String>> {
            ViewController::new(self.store.clone(), "compass", "messages", TTL)
        }

        fn seed(&self, user: &str, saved_at: i64, items: &[&str]) {
            let key = CacheKey::new("compass", "messages", &UserId::new(user), None).unwrap();
            let env = CacheEnvelope::new(saved_at, serde_json::json!(items));
            self.backend.set(key.as_str(), &env.encode().unwrap()).unwrap();
        }

        fn stored(&self, user: &str) -> Option<CacheEnvelope> {
            let key = CacheKey::new("compass", "messages", &UserId::new(user), None).unwrap();
            self.backend
                .get(key.as_str())
                .unwrap()
                .map(|raw| CacheEnvelope::decode(&raw).unwrap())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn warm_fresh_cache_then_server_replaces() {
        let h = Harness::new();
        h.seed("u1", NOW - 60_000, &["A", "B"]);
        let mut view = h.controller();

        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();
        assert_eq!(view.phase(), ViewPhase::HydratedFromCache);
        assert_eq!(view.data(), Some(&strings(&["A", "B"])));
        assert!(view.has_warm_cache());
        assert!(!view.is_stale());
        assert!(!view.has_loaded_from_server());

        let outcome = view.reconcile(&StaticFetcher::ok(&["A", "B", "C"])).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);
        assert_eq!(view.phase(), ViewPhase::Settled);
        assert_eq!(view.data(), Some(&strings(&["A", "B", "C"])));
        assert!(view.has_loaded_from_server());

        let stored = h.stored("u1").unwrap();
        assert_eq!(stored.saved_at, NOW);
        assert_eq!(stored.data, serde_json::json!(["A", "B", "C"]));
    }

    #[tokio::test]
    async fn stale_cache_survives_fetch_failure() {
        let h = Harness::new();
        h.seed("u1", NOW - 600_000, &["A", "B"]);
        let mut view = h.controller();

        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();
        assert!(view.is_stale());
        assert_eq!(view.data(), Some(&strings(&["A", "B"])));

        let err = view.reconcile(&StaticFetcher::err("network down")).await;
        assert!(err.is_err());
        assert_eq!(view.phase(), ViewPhase::Settled);
        assert_eq!(view.data(), Some(&strings(&["A", "B"])));
        assert!(view.last_error().unwrap().contains("network down"));
        assert!(!view.has_loaded_from_server());
        assert_eq!(h.stored("u1").unwrap().saved_at, NOW - 600_000);
    }

    #[tokio::test]
    async fn empty_cache_hydrates_empty_and_fetch_populates() {
        let h = Harness::new();
        let mut view = h.controller();

        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();
        assert_eq!(view.phase(), ViewPhase::HydratedEmpty);
        assert!(!view.has_warm_cache());
        assert!(view.data().is_none());

        view.reconcile(&StaticFetcher::ok(&["A"])).await.unwrap();
        assert_eq!(h.stored("u1").unwrap().data, serde_json::json!(["A"]));
    }

    #[test]
    fn local_update_without_any_load_is_not_persisted() {
        let h = Harness::new();
        let mut view = h.controller();
        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();

        view.update(|data| data.get_or_insert_with(Vec::new).push("draft".into()));
        assert_eq!(view.data(), Some(&strings(&["draft"])));
        assert!(h.stored("u1").is_none());
    }

    #[test]
    fn local_update_on_warm_cache_is_persisted() {
        let h = Harness::new();
        h.seed("u1", NOW - 1_000, &["A"]);
        let mut view = h.controller();
        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();

        h.clock.advance(10);
        view.update(|data| data.get_or_insert_with(Vec::new).push("B".into()));
        let stored = h.stored("u1").unwrap();
        assert_eq!(stored.data, serde_json::json!(["A", "B"]));
        assert_eq!(stored.saved_at, NOW + 10);
    }

    #[test]
    fn hydration_alone_does_not_restamp_cache() {
        let h = Harness::new();
        h.seed("u1", NOW - 600_000, &["A"]);
        let mut view = h.controller();
        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();
        assert_eq!(h.stored("u1").unwrap().saved_at, NOW - 600_000);
    }

    #[test]
    fn identity_switch_discards_in_flight_result() {
        let h = Harness::new();
        h.seed("u2", NOW, &["theirs"]);
        let mut view = h.controller();

        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();
        let ticket = view.begin_reconcile().unwrap();
        assert_eq!(view.phase(), ViewPhase::Reconciling);

        view.activate(ViewIdentity::user(UserId::new("u2"))).unwrap();
        let outcome = view
            .complete_reconcile(ticket, Ok(strings(&["u1 secret"])))
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Discarded);
        assert_eq!(view.data(), Some(&strings(&["theirs"])));
        assert_eq!(view.phase(), ViewPhase::HydratedFromCache);
        assert!(h.stored("u1").is_none());
    }

    #[test]
    fn reactivating_same_identity_is_noop() {
        let h = Harness::new();
        let mut view = h.controller();
        let identity = ViewIdentity::scoped(UserId::new("u1"), "c1__u1");
        view.activate(identity.clone()).unwrap();
        view.update(|data| *data = Some(strings(&["local"])));
        view.activate(identity).unwrap();
        assert_eq!(view.data(), Some(&strings(&["local"])));
        assert_eq!(view.key().unwrap().as_str(), "compass::messages::u1::c1__u1");
    }

    #[test]
    fn invalid_identity_is_rejected() {
        let h = Harness::new();
        let mut view = h.controller();
        let err = view
            .activate(ViewIdentity::user(UserId::new("")))
            .unwrap_err();
        assert!(matches!(err, CompassError::InvalidInput(_)));
        assert_eq!(view.phase(), ViewPhase::Uninitialized);
        assert!(view.begin_reconcile().is_none());
    }

    #[tokio::test]
    async fn last_completion_wins() {
        let h = Harness::new();
        let mut view = h.controller();
        view.activate(ViewIdentity::user(UserId::new("u1"))).unwrap();

        let first = view.begin_reconcile().unwrap();
        let second = view.begin_reconcile().unwrap();
        view.complete_reconcile(second, Ok(strings(&["second"]))).unwrap();
        view.complete_reconcile(first, Ok(strings(&["first"]))).unwrap();

        assert_eq!(view.data(), Some(&strings(&["first"])));
        assert_eq!(h.stored("u1").unwrap().data, serde_json::json!(["first"]));
    }
}
