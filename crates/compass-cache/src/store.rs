// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The cache store: timestamped envelopes over a [`KvBackend`].
//!
//! No operation returns an error. Unreadable records are evicted and reported
//! as misses, and failed writes are dropped. Both are logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use compass_core::UserId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::KvBackend;
use crate::clock::Clock;
use crate::envelope::CacheEnvelope;
use crate::key::CacheKey;

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    /// A trustworthy record existed.
    pub found: bool,
    /// True when not found, or when older than the TTL.
    pub is_stale: bool,
    pub data: Option<T>,
}

impl<T> CacheRead<T> {
    pub fn miss() -> Self {
        Self {
            found: false,
            is_stale: true,
            data: None,
        }
    }

    fn hit(data: T, is_stale: bool) -> Self {
        Self {
            found: true,
            is_stale,
            data: Some(data),
        }
    }

    /// Found and within the TTL.
    pub fn is_fresh(&self) -> bool {
        self.found && !self.is_stale
    }
}

/// Snapshot of cache store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hits whose record was older than the TTL. Also counted in `hits`.
    pub stale_hits: u64,
    pub corrupt_evictions: u64,
    pub write_failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    corrupt_evictions: AtomicU64,
    write_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Shared, key-partitioned cache of view payloads.
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            counters: Counters::default(),
        }
    }

    /// Reads `key` and reports whether it is older than `ttl_ms`.
    ///
    /// Staleness is strict: a record exactly `ttl_ms` old is still fresh.
    pub fn read<T: DeserializeOwned>(&self, key: &CacheKey, ttl_ms: u64) -> CacheRead<T> {
        self.read_raw(key.as_str(), ttl_ms)
    }

    /// Overwrites `key` with `data` stamped at the current time.
    pub fn write<T: Serialize>(&self, key: &CacheKey, data: &T) {
        self.write_raw(key.as_str(), data);
    }

    pub fn evict(&self, key: &CacheKey) {
        self.evict_raw(key.as_str());
    }

    /// Keys of `user` under `app`. Unparseable keys are skipped.
    pub fn user_keys(&self, app: &str, user: &UserId) -> Vec<CacheKey> {
        match self.backend.keys() {
            Ok(keys) => keys
                .iter()
                .filter_map(|raw| CacheKey::parse(raw).ok())
                .filter(|k| k.belongs_to(app, user))
                .collect(),
            Err(e) => {
                warn!(app, user = %user, error = %e, "cache key listing failed");
                Vec::new()
            }
        }
    }

    /// Removes every key of `user` under `app`. Returns how many were removed.
    pub fn evict_user(&self, app: &str, user: &UserId) -> usize {
        let keys = self.user_keys(app, user);
        for key in &keys {
            self.evict(key);
        }
        debug!(app, user = %user, evicted = keys.len(), "evicted user cache keys");
        keys.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            corrupt_evictions: self.counters.corrupt_evictions.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn read_raw<T: DeserializeOwned>(&self, key: &str, ttl_ms: u64) -> CacheRead<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                bump(&self.counters.misses);
                return CacheRead::miss();
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                bump(&self.counters.misses);
                return CacheRead::miss();
            }
        };

        let decoded = CacheEnvelope::decode(&raw).map_err(|e| e.to_string()).and_then(|env| {
            let saved_at = env.saved_at;
            serde_json::from_value::<T>(env.data)
                .map(|data| (saved_at, data))
                .map_err(|e| format!("payload does not match expected shape: {e}"))
        });

        match decoded {
            Ok((saved_at, data)) => {
                let age = self.clock.now_ms().saturating_sub(saved_at);
                let is_stale = age > i64::try_from(ttl_ms).unwrap_or(i64::MAX);
                bump(&self.counters.hits);
                if is_stale {
                    bump(&self.counters.stale_hits);
                }
                CacheRead::hit(data, is_stale)
            }
            Err(reason) => {
                warn!(key, reason = %reason, "evicting corrupt cache record");
                bump(&self.counters.corrupt_evictions);
                bump(&self.counters.misses);
                self.evict_raw(key);
                CacheRead::miss()
            }
        }
    }

    pub(crate) fn write_raw<T: Serialize>(&self, key: &str, data: &T) {
        let encoded = serde_json::to_value(data)
            .map(|data| CacheEnvelope::new(self.clock.now_ms(), data))
            .and_then(|env| env.encode());
        let result = match encoded {
            Ok(raw) => self.backend.set(key, &raw).map_err(|e| e.to_string()),
            Err(e) => Err(format!("serialization failed: {e}")),
        };
        if let Err(error) = result {
            warn!(key, error = %error, "cache write dropped");
            bump(&self.counters.write_failures);
        }
    }

    pub(crate) fn evict_raw(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(key, error = %e, "cache eviction failed");
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::backend::{BackendError, MemoryBackend};
    use crate::clock::ManualClock;

    const TTL: u64 = 120_000;

    struct DownBackend;

    impl KvBackend for DownBackend {
        fn get(&self, _: &str) -> Result<Option<String>, BackendError> {
            Err(BackendError::Unavailable("storage disabled".into()))
        }
        fn set(&self, _: &str, _: &str) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("storage disabled".into()))
        }
        fn remove(&self, _: &str) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("storage disabled".into()))
        }
        fn keys(&self) -> Result<Vec<String>, BackendError> {
            Err(BackendError::Unavailable("storage disabled".into()))
        }
    }

    fn setup(now: i64) -> (CacheStore, Arc<MemoryBackend>, Arc<ManualClock>) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(now));
        let store = CacheStore::new(backend.clone(), clock.clone());
        (store, backend, clock)
    }

    fn key(user: &str, view: &str) -> CacheKey {
        CacheKey::new("compass", view, &UserId::new(user), None).unwrap()
    }

    #[test]
    fn write_then_read_is_fresh() {
        let (store, _, _) = setup(1_000_000);
        let k = key("u1", "messages");
        store.write(&k, &vec!["a", "b"]);
        let read: CacheRead<Vec<String>> = store.read(&k, TTL);
        assert!(read.found);
        assert!(!read.is_stale);
        assert_eq!(read.data, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn staleness_boundary_is_strict() {
        let (store, _, clock) = setup(1_000_000);
        let k = key("u1", "messages");
        store.write(&k, &1);

        clock.advance(TTL as i64);
        assert!(!store.read::<i32>(&k, TTL).is_stale);

        clock.advance(1);
        let read = store.read::<i32>(&k, TTL);
        assert!(read.found);
        assert!(read.is_stale);
        assert_eq!(read.data, Some(1));
    }

    #[test]
    fn missing_key_is_stale_miss() {
        let (store, _, _) = setup(0);
        let read: CacheRead<i32> = store.read(&key("u1", "v"), TTL);
        assert_eq!(read, CacheRead::miss());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    #[traced_test]
    fn corrupt_record_is_evicted() {
        let (store, backend, _) = setup(0);
        let k = key("u1", "v");
        backend.set(k.as_str(), "{not json").unwrap();

        let read: CacheRead<i32> = store.read(&k, TTL);
        assert!(!read.found);
        assert!(read.is_stale);
        assert_eq!(backend.get(k.as_str()).unwrap(), None);
        assert_eq!(store.stats().corrupt_evictions, 1);
        assert!(logs_contain("evicting corrupt cache record"));
    }

    #[test]
    fn record_with_wrong_payload_shape_is_evicted() {
        let (store, backend, _) = setup(0);
        let k = key("u1", "v");
        let raw = json!({"savedAt": 0, "data": {"unexpected": true}}).to_string();
        backend.set(k.as_str(), &raw).unwrap();

        let read: CacheRead<Vec<String>> = store.read(&k, TTL);
        assert!(!read.found);
        assert_eq!(backend.get(k.as_str()).unwrap(), None);
    }

    #[test]
    fn record_without_saved_at_is_evicted() {
        let (store, backend, _) = setup(0);
        let k = key("u1", "v");
        backend.set(k.as_str(), r#"{"data":[1]}"#).unwrap();
        assert!(!store.read::<Vec<i32>>(&k, TTL).found);
        assert_eq!(backend.get(k.as_str()).unwrap(), None);
    }

    #[test]
    #[traced_test]
    fn quota_failure_is_swallowed() {
        let backend = Arc::new(MemoryBackend::with_quota(16));
        let store = CacheStore::new(backend, Arc::new(ManualClock::new(0)));
        let k = key("u1", "v");
        store.write(&k, &"a long payload that cannot fit");
        assert!(!store.read::<String>(&k, TTL).found);
        assert_eq!(store.stats().write_failures, 1);
        assert!(logs_contain("cache write dropped"));
    }

    #[test]
    fn unavailable_backend_behaves_as_empty_cache() {
        let store = CacheStore::new(Arc::new(DownBackend), Arc::new(ManualClock::new(0)));
        let k = key("u1", "v");
        store.write(&k, &1);
        store.evict(&k);
        assert_eq!(store.read::<i32>(&k, TTL), CacheRead::miss());
        assert_eq!(store.evict_user("compass", &UserId::new("u1")), 0);
    }

    #[test]
    fn write_overwrites_and_restamps() {
        let (store, backend, clock) = setup(1_000);
        let k = key("u1", "v");
        store.write(&k, &1);
        clock.advance(5_000);
        store.write(&k, &2);
        let env = CacheEnvelope::decode(&backend.get(k.as_str()).unwrap().unwrap()).unwrap();
        assert_eq!(env.saved_at, 6_000);
        assert_eq!(env.data, json!(2));
    }

    #[test]
    fn evict_missing_key_is_noop() {
        let (store, _, _) = setup(0);
        store.evict(&key("u1", "v"));
        assert_eq!(store.stats(), CacheStats::default());
    }

    #[test]
    fn evict_user_only_touches_that_user() {
        let (store, backend, _) = setup(0);
        store.write(&key("u1", "messages"), &1);
        store.write(
            &CacheKey::new("compass", "thread", &UserId::new("u1"), Some("c1__u1")).unwrap(),
            &2,
        );
        store.write(&key("u2", "messages"), &3);
        store.write(
            &CacheKey::new("other", "messages", &UserId::new("u1"), None).unwrap(),
            &4,
        );
        backend.set("compass::session", "{}").unwrap();

        assert_eq!(store.user_keys("compass", &UserId::new("u1")).len(), 2);
        assert_eq!(store.evict_user("compass", &UserId::new("u1")), 2);
        let mut remaining = backend.keys().unwrap();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "compass::messages::u2".to_string(),
                "compass::session".to_string(),
                "other::messages::u1".to_string(),
            ]
        );
    }

    #[test]
    fn hit_rate_counts_stale_hits_as_hits() {
        let (store, _, clock) = setup(0);
        let k = key("u1", "v");
        store.write(&k, &1);
        let _ = store.read::<i32>(&k, TTL);
        clock.advance(TTL as i64 + 1);
        let _ = store.read::<i32>(&k, TTL);
        let _ = store.read::<i32>(&key("u2", "v"), TTL);

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.stale_hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }
}
