// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every violation instead of failing on the first one.

use crate::diagnostic::ConfigError;
use crate::model::{CacheBackendKind, CompassConfig};

/// Separator that may not appear inside any cache key component.
const KEY_SEPARATOR: &str = "::";

pub fn validate_config(config: &CompassConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let namespace = config.app.namespace.trim();
    if namespace.is_empty() {
        errors.push(ConfigError::validation("app.namespace must not be empty"));
    } else if namespace.contains(KEY_SEPARATOR)
        || namespace.starts_with(':')
        || namespace.ends_with(':')
    {
        errors.push(ConfigError::validation(format!(
            "app.namespace `{namespace}` must not contain `{KEY_SEPARATOR}` or start or end with `:`"
        )));
    }

    if config.cache.backend == CacheBackendKind::Sqlite
        && config.cache.database_path.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "cache.database_path must not be empty when cache.backend = \"sqlite\"",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.badges.interval_ms == 0 {
        errors.push(ConfigError::validation(
            "badges.interval_ms must be greater than 0",
        ));
    }

    if config.badges.max_backoff_ms < config.badges.interval_ms {
        errors.push(ConfigError::validation(format!(
            "badges.max_backoff_ms ({}) must be at least badges.interval_ms ({})",
            config.badges.max_backoff_ms, config.badges.interval_ms
        )));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.anthropic.max_tokens == 0 {
        errors.push(ConfigError::validation(
            "anthropic.max_tokens must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
