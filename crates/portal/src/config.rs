//! Proxy configuration, read from a JSON file.
//!
//! Every field has a default, so a partial file (or `{}`) is valid. A
//! missing file is created with the defaults on first start.

use std::path::Path;
use std::time::Duration;

use portal_session::DEFAULT_MAX_CONCURRENT_TRANSFERS;
use portal_transport::FrameConfig;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub communication: CommunicationConfig,
    pub logger: LoggerConfig,
    /// How long a new connection may take to send its `AuthRequest`.
    pub handshake_timeout_secs: u64,
    /// Cap on concurrent transfers while draining hibernation.
    pub max_concurrent_transfers: usize,
    /// Largest accepted frame payload, in bytes.
    pub max_frame_size: u32,
    pub player_latency: PlayerLatencyConfig,
    pub whitelist: WhitelistConfig,
}

/// The control-plane socket backends connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationConfig {
    pub address: String,
    /// Shared secret every backend must present in its `AuthRequest`.
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
}

/// Periodic `UpdatePlayerLatency` reports to backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerLatencyConfig {
    pub report: bool,
    pub update_interval_secs: u64,
}

/// Whether joining players are checked against the whitelist.
///
/// Only the toggle lives here; the list itself is kept by the player-facing
/// side of the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            communication: CommunicationConfig::default(),
            logger: LoggerConfig::default(),
            handshake_timeout_secs: 5,
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            max_frame_size: FrameConfig::default().max_payload_size,
            player_latency: PlayerLatencyConfig::default(),
            whitelist: WhitelistConfig::default(),
        }
    }
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:19132".to_string(),
            secret: String::new(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for PlayerLatencyConfig {
    fn default() -> Self {
        Self {
            report: true,
            update_interval_secs: 5,
        }
    }
}

impl Config {
    /// Reads and validates the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but writes the defaults to `path` first
    /// if no file exists there.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Config::default();
            std::fs::write(path, serde_json::to_string_pretty(&config)?)?;
            tracing::info!(path = %path.display(), "wrote default config");
            return Ok(config);
        }
        Self::load(path)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.communication.address.is_empty() {
            return Err(ConfigError::Invalid(
                "communication.address must not be empty".into(),
            ));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_secs must be at least 1".into(),
            ));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_transfers must be at least 1".into(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_size must be at least 1".into(),
            ));
        }
        if self.player_latency.report && self.player_latency.update_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "player_latency.update_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Returns the handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Returns the latency report interval as a [`Duration`].
    pub fn latency_interval(&self) -> Duration {
        Duration::from_secs(self.player_latency.update_interval_secs)
    }

    /// Returns the frame limits for the control-plane transport.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_frame_size,
        }
    }
}
