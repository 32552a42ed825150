// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `compass cache`: inspect and clear the local view cache.

use std::sync::Arc;

use clap::Subcommand;
use compass_cache::{CacheKey, CacheStore, KvBackend, MemoryBackend, SqliteBackend, SystemClock};
use compass_config::{CompassConfig, model::CacheBackendKind, model::CacheConfig};
use compass_core::{CompassError, UserId};
use serde_json::json;
use tracing::info;

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CacheAction {
    /// List the cached view keys of a user.
    Keys {
        #[arg(long)]
        user: String,
    },
    /// Print one cached view and whether it is still fresh.
    Get {
        #[arg(long)]
        view: String,
        #[arg(long)]
        user: String,
        /// Sub-scope of the view, e.g. a conversation id.
        #[arg(long)]
        scope: Option<String>,
        /// Freshness window; defaults to `cache.default_ttl_ms`.
        #[arg(long)]
        ttl_ms: Option<u64>,
    },
    /// Remove every cached view of a user.
    Evict {
        #[arg(long)]
        user: String,
    },
}

/// Opens the cache backend selected in `[cache]`.
pub fn open_store(config: &CacheConfig) -> Result<CacheStore, CompassError> {
    let backend: Arc<dyn KvBackend> = match config.backend {
        CacheBackendKind::Sqlite => {
            let backend = SqliteBackend::open(&config.database_path).map_err(|e| {
                CompassError::Cache(format!(
                    "failed to open cache database {}: {e}",
                    config.database_path
                ))
            })?;
            Arc::new(backend)
        }
        CacheBackendKind::Memory => match config.quota_bytes {
            Some(quota) => Arc::new(MemoryBackend::with_quota(quota)),
            None => Arc::new(MemoryBackend::new()),
        },
    };
    Ok(CacheStore::new(backend, Arc::new(SystemClock)))
}

/// Runs one cache action against `store` and returns the JSON to print.
pub fn execute(
    store: &CacheStore,
    app: &str,
    default_ttl_ms: u64,
    action: CacheAction,
) -> Result<serde_json::Value, CompassError> {
    match action {
        CacheAction::Keys { user } => {
            let keys: Vec<String> = store
                .user_keys(app, &UserId::new(user))
                .iter()
                .map(|k| k.as_str().to_string())
                .collect();
            Ok(json!(keys))
        }
        CacheAction::Get {
            view,
            user,
            scope,
            ttl_ms,
        } => {
            let key = CacheKey::new(app, &view, &UserId::new(user), scope.as_deref())
                .map_err(|e| CompassError::InvalidInput(e.to_string()))?;
            let read = store.read::<serde_json::Value>(&key, ttl_ms.unwrap_or(default_ttl_ms));
            Ok(json!({
                "key": key.as_str(),
                "found": read.found,
                "isStale": read.is_stale,
                "data": read.data,
            }))
        }
        CacheAction::Evict { user } => {
            let evicted = store.evict_user(app, &UserId::new(user));
            info!(evicted, "cache entries evicted");
            Ok(json!({ "evicted": evicted }))
        }
    }
}

pub fn run_cache(config: &CompassConfig, action: CacheAction) -> Result<(), CompassError> {
    let store = open_store(&config.cache)?;
    let output = execute(
        &store,
        &config.app.namespace,
        config.cache.default_ttl_ms,
        action,
    )?;
    println!("{output}");
    Ok(())
}
