// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of being silently ignored.

use compass_core::Role;
use serde::{Deserialize, Serialize};

/// Top-level Compass configuration.
///
/// Every section is optional and falls back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompassConfig {
    #[serde(default)]
    pub app: AppConfig,

    /// Local cache store settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Authoritative SQLite store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Badge polling settings.
    #[serde(default)]
    pub badges: BadgesConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// AI-chat system prompt settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Application identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// First segment of every cache key.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            log_level: default_log_level(),
        }
    }
}

fn default_namespace() -> String {
    "compass".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which key-value backend holds cache envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Persistent across restarts.
    #[default]
    Sqlite,
    /// Process-local, lost on exit.
    Memory,
}

/// Local cache store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// SQLite file used when `backend = "sqlite"`.
    #[serde(default = "default_cache_database_path")]
    pub database_path: String,

    /// Age in milliseconds after which a cached view is reported stale.
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Byte quota for the memory backend. `None` means unlimited.
    #[serde(default)]
    pub quota_bytes: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            database_path: default_cache_database_path(),
            default_ttl_ms: default_ttl_ms(),
            quota_bytes: None,
        }
    }
}

fn default_cache_database_path() -> String {
    "compass-cache.db".to_string()
}

fn default_ttl_ms() -> u64 {
    120_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "compass.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Badge poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BadgesConfig {
    /// Delay between successful passes.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound of the random delay added to each sleep.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Ceiling for the exponential backoff after failed passes.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Roles whose unread counts honour stored read markers. Other roles
    /// use the trailing-edge heuristic only.
    #[serde(default = "default_read_marker_roles")]
    pub read_marker_roles: Vec<Role>,
}

impl Default for BadgesConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            jitter_ms: default_jitter_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            read_marker_roles: default_read_marker_roles(),
        }
    }
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_jitter_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_read_marker_roles() -> Vec<Role> {
    vec![Role::Student, Role::Counselor, Role::Teacher, Role::Parent]
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to `ANTHROPIC_API_KEY`; if that is
    /// also unset the chat route answers 503.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// System prompt sources for the AI-chat proxy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
