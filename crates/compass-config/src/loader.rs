// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/compass/compass.toml`,
//! `~/.config/compass/compass.toml`, `./compass.toml`, `COMPASS_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CompassConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/compass/compass.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "compass.toml";

/// Sections recognised in env var names, e.g. `COMPASS_BADGES_INTERVAL_MS`.
const ENV_SECTIONS: &[&str] = &[
    "app",
    "cache",
    "storage",
    "badges",
    "anthropic",
    "chat",
    "gateway",
];

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("compass").join("compass.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<CompassConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CompassConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CompassConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CompassConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CompassConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The un-extracted Figment for the standard hierarchy.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(CompassConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG_FILE)).merge(env_provider())
}

/// Env provider mapping `COMPASS_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `COMPASS_CACHE_DEFAULT_TTL_MS` maps to `cache.default_ttl_ms`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("COMPASS_").map(|key| {
        let key_str = key.as_str();
        ENV_SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|field| format!("{section}.{field}"))
            })
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_maps_section_and_underscored_key() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COMPASS_CACHE_DEFAULT_TTL_MS", "5000");
            jail.set_env("COMPASS_ANTHROPIC_API_KEY", "sk-test");
            jail.set_env("COMPASS_GATEWAY_PORT", "8080");
            let config: CompassConfig = Figment::new()
                .merge(Serialized::defaults(CompassConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.cache.default_ttl_ms, 5000);
            assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-test"));
            assert_eq!(config.gateway.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[app]\nnamespace = \"from-file\"\n")?;
            jail.set_env("COMPASS_APP_NAMESPACE", "from-env");
            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.app.namespace, "from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = load_config_from_path(Path::new("/nonexistent/compass.toml"))?;
            assert_eq!(config.app.namespace, "compass");
            Ok(())
        });
    }
}
