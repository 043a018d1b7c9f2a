//! Configuration for the Rackline client.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/rackline/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default server endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:4044";

/// Default public key/identifier presented during authentication.
pub const DEFAULT_KEY: &str = "default";

/// Default window for a correlated reply, in milliseconds.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Default window for connection establishment, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("endpoint must be a ws:// or wss:// URL, got {0}")]
    InvalidEndpoint(String),

    #[error("command_timeout_ms must be greater than 0")]
    InvalidCommandTimeout,

    #[error("connect_timeout_ms must be greater than 0")]
    InvalidConnectTimeout,

    #[error("key must not be empty")]
    EmptyKey,
}

/// Client configuration.
///
/// The private key may stay empty for servers that do not require cipher
/// mode; authentication then completes after the first handshake step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the rack server.
    pub endpoint: String,

    /// Public key/identifier presented during authentication. Doubles as IV
    /// material for cipher mode.
    pub key: String,

    /// Private key used as key material for cipher mode.
    pub private_key: String,

    /// Window for a correlated reply, in milliseconds.
    pub command_timeout_ms: u64,

    /// Window for connection establishment, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key: DEFAULT_KEY.to_string(),
            private_key: String::new(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rackline")
        .join("config.toml")
}

impl ClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the public key/identifier.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the private key.
    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = private_key.into();
        self
    }

    /// Set the command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Window for a correlated reply.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Window for connection establishment.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - RACKLINE_ENDPOINT: Override the server endpoint
    /// - RACKLINE_KEY: Override the public key/identifier
    /// - RACKLINE_PRIVATE_KEY: Override the private key (keeps it out of the
    ///   config file)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("RACKLINE_ENDPOINT") {
            if !endpoint.is_empty() {
                tracing::info!("Overriding endpoint from environment: {}", endpoint);
                self.endpoint = endpoint;
            }
        }

        if let Ok(key) = std::env::var("RACKLINE_KEY") {
            if !key.is_empty() {
                tracing::info!("Overriding key from environment");
                self.key = key;
            }
        }

        if let Ok(private_key) = std::env::var("RACKLINE_PRIVATE_KEY") {
            if !private_key.is_empty() {
                tracing::info!("Overriding private key from environment");
                self.private_key = private_key;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.endpoint) {
            Ok(parsed) if parsed.scheme() == "ws" || parsed.scheme() == "wss" => {}
            _ => return Err(ConfigError::InvalidEndpoint(self.endpoint.clone())),
        }

        if self.command_timeout_ms == 0 {
            return Err(ConfigError::InvalidCommandTimeout);
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidConnectTimeout);
        }

        if self.key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", e))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}
