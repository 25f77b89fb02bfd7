//! Configuration constants and types for covert-vfs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// End-of-message marker appended to every payload.
pub const DEFAULT_TERMINATOR: u8 = 0x04;

/// Length of the digest prefix on every batch.
pub const DEFAULT_CHECKSUM_SIZE: usize = 4;

/// Sync object poll period (~60 polls per second).
pub const DEFAULT_SIGNAL_POLL_MICROS: u64 = 16_667;

/// Client counter poll period while listening.
pub const DEFAULT_CONNECTION_POLL_MILLIS: u64 = 100;

/// Upper bound on filler bytes appended by a single tuning call.
pub const DEFAULT_TUNE_CEILING: usize = 65_536;

/// Property carrying the control signal under the property encoding.
pub const DEFAULT_SIGNAL_KEY: &str = "sync_status";

/// Prefix of the numbered payload properties.
pub const DEFAULT_PROPERTY_PREFIX: &str = "hash_";

/// Longest meaningful digest: base64 of 4 bytes is 6 data characters + 2 padding.
const MAX_CHECKSUM_SIZE: usize = 8;

/// Transport configuration shared by the allocator, signals, codecs and protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Byte marking the end of a message.
    pub terminator: u8,

    /// Number of digest characters prefixed to each batch.
    pub checksum_size: usize,

    /// Delay before each sync object poll, in microseconds.
    pub signal_poll_micros: u64,

    /// Delay between client counter polls while listening, in milliseconds.
    pub connection_poll_millis: u64,

    /// Maximum filler bytes one tuning call may append.
    pub tune_ceiling: usize,

    /// Property name used by the property signal encoding.
    pub signal_key: String,

    /// Prefix for numbered payload properties.
    pub property_prefix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            terminator: DEFAULT_TERMINATOR,
            checksum_size: DEFAULT_CHECKSUM_SIZE,
            signal_poll_micros: DEFAULT_SIGNAL_POLL_MICROS,
            connection_poll_millis: DEFAULT_CONNECTION_POLL_MILLIS,
            tune_ceiling: DEFAULT_TUNE_CEILING,
            signal_key: DEFAULT_SIGNAL_KEY.to_string(),
            property_prefix: DEFAULT_PROPERTY_PREFIX.to_string(),
        }
    }
}

impl TransportConfig {
    /// Configuration with both poll periods shortened, for local stores and tests.
    pub fn fast() -> Self {
        Self {
            signal_poll_micros: 500,
            connection_poll_millis: 2,
            ..Self::default()
        }
    }

    /// Delay before each sync object poll.
    pub fn signal_poll(&self) -> Duration {
        Duration::from_micros(self.signal_poll_micros)
    }

    /// Delay between client counter polls while listening.
    pub fn connection_poll(&self) -> Duration {
        Duration::from_millis(self.connection_poll_millis)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.checksum_size == 0 || self.checksum_size > MAX_CHECKSUM_SIZE {
            return Err(Error::Config(format!(
                "checksum_size must be between 1 and {}",
                MAX_CHECKSUM_SIZE
            )));
        }
        if self.terminator.is_ascii_alphanumeric() || b"+/=".contains(&self.terminator) {
            return Err(Error::Config(
                "terminator must not be a base64 alphabet character".to_string(),
            ));
        }
        if self.tune_ceiling == 0 {
            return Err(Error::Config("tune_ceiling must be greater than 0".to_string()));
        }
        if self.signal_key.is_empty() || self.property_prefix.is_empty() {
            return Err(Error::Config(
                "signal_key and property_prefix must not be empty".to_string(),
            ));
        }
        if self.signal_key.starts_with(&self.property_prefix) {
            return Err(Error::Config(
                "signal_key must not share the payload property prefix".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration file, falling back to defaults when it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: TransportConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
