// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The signed-in user, persisted in the cache store's session slot.

use std::sync::Arc;

use compass_core::Viewer;
use tracing::info;

use crate::key::SEPARATOR;
use crate::store::CacheStore;

/// Name of the reserved slot. A two-part key can never parse as a
/// [`CacheKey`](crate::CacheKey), so it cannot collide with view data.
const SESSION_SLOT: &str = "session";

/// Application-scoped replacement for a global "current user".
#[derive(Debug)]
pub struct SessionContext {
    store: Arc<CacheStore>,
    app: String,
    slot: String,
    viewer: Option<Viewer>,
}

impl SessionContext {
    pub fn new(store: Arc<CacheStore>, app: impl Into<String>) -> Self {
        let app = app.into();
        let slot = format!("{app}{SEPARATOR}{SESSION_SLOT}");
        Self {
            store,
            app,
            slot,
            viewer: None,
        }
    }

    /// Restores the persisted viewer, if any.
    pub fn hydrate(&mut self) -> Option<&Viewer> {
        // Sessions do not expire through the cache TTL.
        self.viewer = self.store.read_raw::<Viewer>(&self.slot, u64::MAX).data;
        self.viewer.as_ref()
    }

    pub fn login(&mut self, viewer: Viewer) {
        info!(user = %viewer.user_id, role = %viewer.role, "session started");
        self.store.write_raw(&self.slot, &viewer);
        self.viewer = Some(viewer);
    }

    /// Clears the session and every cached view of the departing user.
    /// Returns the number of view keys evicted.
    pub fn logout(&mut self) -> usize {
        self.store.evict_raw(&self.slot);
        let Some(viewer) = self.viewer.take() else {
            return 0;
        };
        let evicted = self.store.evict_user(&self.app, &viewer.user_id);
        info!(user = %viewer.user_id, evicted, "session ended");
        evicted
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn app(&self) -> &str {
        &self.app
    }
}

#[cfg(test)]
mod tests {
    use compass_core::{Role, SchoolId, UserId};

    use super::*;
    use crate::backend::{KvBackend, MemoryBackend};
    use crate::clock::ManualClock;
    use crate::key::CacheKey;

    fn viewer() -> Viewer {
        Viewer::new(
            UserId::new("s1"),
            Role::Student,
            Some(SchoolId::new("school-1")),
        )
    }

    fn setup() -> (Arc<CacheStore>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CacheStore::new(
            backend.clone(),
            Arc::new(ManualClock::new(0)),
        ));
        (store, backend)
    }

    #[test]
    fn login_survives_new_context() {
        let (store, _) = setup();
        let mut session = SessionContext::new(store.clone(), "compass");
        assert!(session.hydrate().is_none());
        session.login(viewer());

        let mut restored = SessionContext::new(store, "compass");
        assert_eq!(restored.hydrate(), Some(&viewer()));
    }

    #[test]
    fn logout_clears_slot_and_user_views() {
        let (store, backend) = setup();
        let mut session = SessionContext::new(store.clone(), "compass");
        session.login(viewer());
        let mine = CacheKey::new("compass", "messages", &UserId::new("s1"), None).unwrap();
        let theirs = CacheKey::new("compass", "messages", &UserId::new("c1"), None).unwrap();
        store.write(&mine, &1);
        store.write(&theirs, &2);

        assert_eq!(session.logout(), 1);
        assert!(session.viewer().is_none());
        assert_eq!(backend.get("compass::session").unwrap(), None);
        assert_eq!(backend.get(mine.as_str()).unwrap(), None);
        assert!(backend.get(theirs.as_str()).unwrap().is_some());

        let mut fresh = SessionContext::new(store, "compass");
        assert!(fresh.hydrate().is_none());
    }

    #[test]
    fn corrupt_session_is_dropped() {
        let (store, backend) = setup();
        backend.set("compass::session", "garbage").unwrap();
        let mut session = SessionContext::new(store, "compass");
        assert!(session.hydrate().is_none());
        assert_eq!(backend.get("compass::session").unwrap(), None);
    }
}
