// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Compass configuration system.

use compass_config::diagnostic::ConfigError;
use compass_config::model::{CacheBackendKind, CompassConfig};
use compass_config::{load_and_validate_str, load_config_from_str};
use compass_core::Role;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[app]
namespace = "school-app"
log_level = "debug"

[cache]
backend = "memory"
default_ttl_ms = 60000
quota_bytes = 5242880

[storage]
database_path = "/tmp/compass.db"
wal_mode = false

[badges]
interval_ms = 10000
jitter_ms = 250
max_backoff_ms = 120000
read_marker_roles = ["student"]

[anthropic]
api_key = "sk-ant-123"
max_tokens = 2048

[chat]
system_prompt = "Be kind."

[gateway]
host = "0.0.0.0"
port = 8080
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.namespace, "school-app");
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.cache.backend, CacheBackendKind::Memory);
    assert_eq!(config.cache.default_ttl_ms, 60_000);
    assert_eq!(config.cache.quota_bytes, Some(5_242_880));
    assert_eq!(config.storage.database_path, "/tmp/compass.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.badges.interval_ms, 10_000);
    assert_eq!(config.badges.jitter_ms, 250);
    assert_eq!(config.badges.read_marker_roles, vec![Role::Student]);
    assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant-123"));
    assert_eq!(config.anthropic.max_tokens, 2048);
    assert_eq!(config.chat.system_prompt.as_deref(), Some("Be kind."));
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 8080);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.app.namespace, "compass");
    assert_eq!(config.app.log_level, "info");
    assert_eq!(config.cache.backend, CacheBackendKind::Sqlite);
    assert_eq!(config.cache.database_path, "compass-cache.db");
    assert_eq!(config.cache.default_ttl_ms, 120_000);
    assert!(config.cache.quota_bytes.is_none());
    assert_eq!(config.storage.database_path, "compass.db");
    assert!(config.storage.wal_mode);
    assert_eq!(config.badges.interval_ms, 5_000);
    assert_eq!(config.badges.read_marker_roles.len(), 4);
    assert!(config.anthropic.api_key.is_none());
    assert!(config.chat.system_prompt.is_none());
    assert!(config.chat.system_prompt_file.is_none());
    assert_eq!(config.gateway.host, "127.0.0.1");
}

#[test]
fn dotted_override_sets_nested_key() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: CompassConfig = Figment::new()
        .merge(Serialized::defaults(CompassConfig::default()))
        .merge(Toml::string("[badges]\ninterval_ms = 1000\n"))
        .merge(("badges.interval_ms", 2000))
        .extract()
        .expect("should merge override");

    assert_eq!(config.badges.interval_ms, 2000);
}

#[test]
fn unknown_top_level_section_rejected() {
    let err = load_config_from_str("[telemetry]\nenabled = true\n")
        .expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telemetry"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn diagnostic_unknown_key_has_suggestion_and_valid_keys() {
    let toml = r#"
[badges]
intervl_ms = 1000
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "intervl_ms"
                && suggestion.as_deref() == Some("interval_ms")
                && valid_keys.contains("max_backoff_ms")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn diagnostic_invalid_type_names_key() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n")
        .expect_err("string port should be rejected");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))
    });
    assert!(found, "expected InvalidType for gateway.port, got: {errors:?}");
}

#[test]
fn validation_errors_surface_through_load() {
    let errors = load_and_validate_str("[badges]\ninterval_ms = 0\n")
        .expect_err("zero interval should fail validation");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("interval_ms"))
    ));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "namespce".to_string(),
        suggestion: Some("namespace".to_string()),
        valid_keys: "namespace, log_level".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("perhaps you meant `namespace`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("namespce"));
}
