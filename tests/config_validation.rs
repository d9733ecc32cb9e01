//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use gateway_protocol::config::{NetworkConfig, ServerConfig, TransportConfig};
use gateway_protocol::core::codec::MAX_FRAME_LENGTH;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_invalid_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_keepalive_timeout_must_exceed_interval() {
    let server = ServerConfig {
        keepalive_interval: Duration::from_secs(20),
        keepalive_timeout: Duration::from_secs(10),
        ..ServerConfig::default()
    };
    let errors = server.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("longer than the keep-alive interval")));
}

#[test]
fn test_frame_length_capped_by_varint() {
    let transport = TransportConfig {
        max_frame_length: MAX_FRAME_LENGTH + 1,
        ..TransportConfig::default()
    };
    assert!(transport
        .validate()
        .iter()
        .any(|e| e.contains("3-byte varint")));
}

#[test]
fn test_bad_compression_level() {
    let transport = TransportConfig {
        compression_level: 12,
        ..TransportConfig::default()
    };
    assert!(transport
        .validate()
        .iter()
        .any(|e| e.contains("Invalid compression level")));
}

#[test]
fn test_session_server_scheme() {
    let mut config = NetworkConfig::default();
    assert!(config.auth.session_server.starts_with("https://"));
    assert!(config.auth.validate().is_empty());

    config.auth.session_server = "http://127.0.0.1:8080".into();
    assert!(config.auth.validate().is_empty());

    config.auth.session_server = "ftp://sessionserver.example".into();
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("http:// or https:// URL")));

    config.auth.session_server = "https://".into();
    assert!(config.validate().iter().any(|e| e.contains("no host")));
}

#[test]
fn test_multiple_errors_reported_together() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();
    config.server.max_connections = 0;
    config.status.version_name = String::new();

    let errors = config.validate();
    assert!(errors.len() >= 3, "expected several errors, got {errors:?}");

    let strict = config.validate_strict().unwrap_err().to_string();
    assert!(strict.contains("Configuration validation failed"));
}

#[test]
fn test_toml_roundtrip_through_file() {
    let mut config = NetworkConfig::default();
    config.server.address = "0.0.0.0:25566".into();
    config.transport.compression_threshold = -1;
    config.logging.log_level = Level::DEBUG;

    let path = std::env::temp_dir().join(format!("gateway-config-{}.toml", std::process::id()));
    config.save_to_file(&path).unwrap();
    let loaded = NetworkConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.server.address, "0.0.0.0:25566");
    assert_eq!(loaded.transport.compression(), None);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert_eq!(loaded.server.login_timeout, config.server.login_timeout);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = NetworkConfig::from_toml(
        r#"
        [server]
        address = "127.0.0.1:30000"
        max_connections = 50
        login_timeout = 5000
        keepalive_interval = 15000
        keepalive_timeout = 30000
        shutdown_timeout = 10000
        "#,
    );
    let config = match config {
        Ok(config) => config,
        Err(e) => panic!("partial config should parse: {e}"),
    };
    assert_eq!(config.server.max_connections, 50);
    assert_eq!(config.server.login_timeout, Duration::from_secs(5));
    assert_eq!(config.status.max_players, 20);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = NetworkConfig::from_file("/nonexistent/gateway.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
fn test_env_lookup_overrides() {
    let mut config = NetworkConfig::default();
    config
        .apply_env(|key| match key {
            "GATEWAY_MAX_CONNECTIONS" => Some("12".into()),
            "GATEWAY_COMPRESSION_THRESHOLD" => Some("-1".into()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.server.max_connections, 12);
    assert_eq!(config.transport.compression(), None);
}
