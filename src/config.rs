//! Bridge configuration.
//!
//! Built-in defaults, optionally overlaid by a JSON file and then by
//! command-line flags. Missing file fields keep their defaults.

use core::time::Duration;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapters::bt_device::DEFAULT_DEVICE_PATH;
use crate::adapters::ipc_socket::DEFAULT_SOCKET_PATH;
use crate::bt::codec::{MAX_FRAME_SIZE, RESPONSE_HEADER_SIZE};
use crate::error::ConfigError;

/// Longest per-request timeout accepted.
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Bridge daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// BT character device node
    pub device_path: PathBuf,
    /// Where the IPC datagram socket is bound
    pub socket_path: PathBuf,
    /// How long a request may wait for its response (milliseconds)
    pub timeout_ms: u64,
    /// Largest response frame written to the device, length byte included
    pub max_frame_len: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            timeout_ms: 5000,
            max_frame_len: MAX_FRAME_SIZE,
        }
    }
}

impl BridgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Couldn't read config {}: {}", path.display(), e);
            ConfigError::Unreadable
        })?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| {
            log::error!("Couldn't parse config: {}", e);
            ConfigError::Corrupted
        })
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("device_path is empty"));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("socket_path is empty"));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::ValidationFailed(
                "timeout_ms must be within 1..=60000",
            ));
        }
        if !(RESPONSE_HEADER_SIZE..=MAX_FRAME_SIZE).contains(&self.max_frame_len) {
            return Err(ConfigError::ValidationFailed(
                "max_frame_len must be within 5..=64",
            ));
        }
        Ok(())
    }
}
