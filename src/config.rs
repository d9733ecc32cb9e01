//! # Configuration Management
//!
//! Centralized configuration for the gateway.
//!
//! This module provides structured configuration for the listener, the frame
//! pipeline, the status response, the identity verification call and logging.
//! The protocol core only reads these values; nothing here is mutated once a
//! server is running.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`GATEWAY_*`) via `from_env()`
//!
//! ## Security Considerations
//! - Frame and uncompressed-length caps bound memory per connection
//! - The login timeout stops clients that open sockets and never finish logging in
//! - Keep-alive timeouts reap silent `PLAY` sessions

use crate::core::codec::MAX_FRAME_LENGTH;
use crate::core::wire::MAX_STRING_LENGTH;
use crate::error::{ProtocolError, Result};
use crate::protocol::VERSION_NAME;
use crate::utils::compression::{DEFAULT_COMPRESSION_LEVEL, MAX_UNCOMPRESSED_LENGTH};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default compression threshold in bytes
pub const DEFAULT_COMPRESSION_THRESHOLD: i32 = 256;

/// Default session server base URL
pub const DEFAULT_SESSION_SERVER: &str = "https://sessionserver.mojang.com";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Listener and connection lifecycle settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Frame pipeline settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Values reported in the status response
    #[serde(default)]
    pub status: StatusConfig,

    /// Identity verification settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `GATEWAY_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are reported instead of silently ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
            raw.parse::<T>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid value for {key}: '{raw}'"))
            })
        }

        if let Some(addr) = lookup("GATEWAY_SERVER_ADDRESS") {
            self.server.address = addr;
        }
        if let Some(raw) = lookup("GATEWAY_MAX_CONNECTIONS") {
            self.server.max_connections = parse("GATEWAY_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("GATEWAY_LOGIN_TIMEOUT_MS") {
            self.server.login_timeout =
                Duration::from_millis(parse("GATEWAY_LOGIN_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = lookup("GATEWAY_KEEPALIVE_INTERVAL_MS") {
            self.server.keepalive_interval =
                Duration::from_millis(parse("GATEWAY_KEEPALIVE_INTERVAL_MS", &raw)?);
        }
        if let Some(raw) = lookup("GATEWAY_COMPRESSION_THRESHOLD") {
            self.transport.compression_threshold = parse("GATEWAY_COMPRESSION_THRESHOLD", &raw)?;
        }
        if let Some(url) = lookup("GATEWAY_SESSION_SERVER") {
            self.auth.session_server = url;
        }
        if let Some(motd) = lookup("GATEWAY_MOTD") {
            self.status.motd = motd;
        }
        if let Some(raw) = lookup("GATEWAY_LOG_LEVEL") {
            self.logging.log_level = parse("GATEWAY_LOG_LEVEL", &raw)?;
        }
        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.status.validate());
        errors.extend(self.auth.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener and connection lifecycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:25565")
    pub address: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Deadline for reaching `PLAY` after accept
    #[serde(with = "duration_serde")]
    pub login_timeout: Duration,

    /// Interval between keep-alives in `PLAY`
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Silence after which a `PLAY` session is dropped
    #[serde(with = "duration_serde")]
    pub keepalive_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:25565"),
            max_connections: 1000,
            login_timeout: timeout::LOGIN_TIMEOUT,
            keepalive_interval: timeout::KEEPALIVE_INTERVAL,
            keepalive_timeout: timeout::KEEPALIVE_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:25565')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.login_timeout.as_millis() < 100 {
            errors.push("Login timeout too short (minimum: 100ms)".to_string());
        } else if self.login_timeout.as_secs() > 300 {
            errors.push("Login timeout too long (maximum: 300s)".to_string());
        }

        if self.keepalive_interval.as_millis() < 100 {
            errors.push("Keep-alive interval too short (minimum: 100ms)".to_string());
        }
        if self.keepalive_timeout <= self.keepalive_interval {
            errors.push("Keep-alive timeout must be longer than the keep-alive interval".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Frame pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Payloads of at least this many bytes are compressed; negative disables compression
    pub compression_threshold: i32,

    /// zlib level 0-9
    pub compression_level: u32,

    /// Largest accepted frame
    pub max_frame_length: usize,

    /// Largest accepted declared uncompressed length
    pub max_uncompressed_length: usize,

    /// Longest accepted string field, in characters
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,
}

fn default_max_string_length() -> usize {
    MAX_STRING_LENGTH
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_frame_length: MAX_FRAME_LENGTH,
            max_uncompressed_length: MAX_UNCOMPRESSED_LENGTH,
            max_string_length: MAX_STRING_LENGTH,
        }
    }
}

impl TransportConfig {
    /// Threshold to announce at login, if compression is on.
    pub fn compression(&self) -> Option<usize> {
        usize::try_from(self.compression_threshold).ok()
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.compression_level > 9 {
            errors.push(format!(
                "Invalid compression level: {} (valid range: 0-9)",
                self.compression_level
            ));
        }

        if self.max_frame_length < 256 {
            errors.push("Max frame length too small (minimum: 256 bytes)".to_string());
        } else if self.max_frame_length > MAX_FRAME_LENGTH {
            errors.push(format!(
                "Max frame length {} exceeds the 3-byte varint limit {MAX_FRAME_LENGTH}",
                self.max_frame_length
            ));
        }

        if self.max_uncompressed_length > MAX_UNCOMPRESSED_LENGTH {
            errors.push(format!(
                "Max uncompressed length {} exceeds {MAX_UNCOMPRESSED_LENGTH}",
                self.max_uncompressed_length
            ));
        }

        if let Some(threshold) = self.compression() {
            if threshold > self.max_uncompressed_length {
                errors.push(
                    "Compression threshold cannot be larger than max uncompressed length"
                        .to_string(),
                );
            }
        }

        if self.max_string_length == 0 || self.max_string_length > MAX_STRING_LENGTH {
            errors.push(format!(
                "Max string length must be within 1..={MAX_STRING_LENGTH}"
            ));
        }

        errors
    }
}

/// Status response configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    /// Message of the day shown in the server list
    pub motd: String,

    /// Advertised player cap
    pub max_players: u32,

    /// Version label reported alongside the protocol number
    pub version_name: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            motd: String::from("A block game server"),
            max_players: 20,
            version_name: VERSION_NAME.to_string(),
        }
    }
}

impl StatusConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.version_name.is_empty() {
            errors.push("Version name cannot be empty".to_string());
        }
        if self.motd.chars().count() > 256 {
            errors.push("MOTD too long (maximum: 256 characters)".to_string());
        }
        errors
    }
}

/// Identity verification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Session server base URL, `http://` or `https://`
    pub session_server: String,

    /// Timeout for a single verification request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_server: DEFAULT_SESSION_SERVER.to_string(),
            request_timeout: timeout::AUTH_REQUEST_TIMEOUT,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let host = self
            .session_server
            .strip_prefix("https://")
            .or_else(|| self.session_server.strip_prefix("http://"));
        match host {
            None => errors.push(format!(
                "Session server must be an http:// or https:// URL: '{}'",
                self.session_server
            )),
            Some(host) if host.is_empty() || host.starts_with('/') => errors.push(format!(
                "Session server URL has no host: '{}'",
                self.session_server
            )),
            Some(_) => {}
        }
        if self.request_timeout.as_millis() < 100 {
            errors.push("Auth request timeout too short (minimum: 100ms)".to_string());
        } else if self.request_timeout.as_secs() > 60 {
            errors.push("Auth request timeout too long (maximum: 60s)".to_string());
        }
        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("gateway"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Durations are written as integer milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
