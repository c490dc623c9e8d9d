//! Configuration system for the messaging client
//!
//! Loaded from TOML. Every field has a default matching the game front end's
//! built-in constants, so an empty file (or no file at all) is a valid
//! configuration.

use crate::client::{ReconnectMonitor, ReconnectPolicy};
use crate::protocol::endpoint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main client configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

/// Remote endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// WebSocket endpoint (ws:// or wss://)
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Game room to join; appended to the url as `?gameId=`
    pub game_id: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            game_id: None,
        }
    }
}

fn default_server_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

/// Reconnection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    /// Delay before the first reconnect attempt; doubles for each attempt after
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Consecutive reconnect attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound on a single open handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges and the server address
    pub fn validate(&self) -> Result<(), ConfigError> {
        ReconnectMonitor::validate_policy(&self.reconnect_policy())
            .map_err(|e| ConfigError::InvalidConfig(format!("reconnect: {e}")))?;

        self.endpoint()?;
        Ok(())
    }

    /// Full address to connect to, including the game room query if configured
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        let result = match &self.server.game_id {
            Some(game_id) => endpoint::game_room_url(&self.server.url, game_id),
            None => endpoint::validate_ws_url(&self.server.url),
        };
        result.map_err(|e| ConfigError::InvalidConfig(e.to_string()))
    }

    /// Backoff policy derived from the `[reconnect]` section
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_attempts: self.reconnect.max_attempts,
            connect_timeout: Duration::from_millis(self.reconnect.connect_timeout_ms),
        }
    }
}
