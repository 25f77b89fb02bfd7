//! Error types for covert-vfs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for covert-vfs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating or using a covert channel.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from a storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific storage failure (auth, quota, remote API).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Object is not present in the store.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Store root does not exist or is not a directory.
    #[error("Invalid store root: {0}")]
    InvalidRoot(PathBuf),

    /// Channel has no position yet.
    #[error("Channel not connected: call connect or wait_for_connection first")]
    NotConnected,

    /// Not enough objects for the active peers, or the counter cannot advance.
    #[error("Partition error: {0}")]
    Partition(String),

    /// The slice cannot carry even the checksum overhead.
    #[error(
        "Not enough capacity: {objects} objects x {unit_capacity} bytes cannot hold a {checksum_size}-byte checksum"
    )]
    Capacity {
        unit_capacity: usize,
        objects: usize,
        checksum_size: usize,
    },

    /// Tuning did not converge or a property payload was malformed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Payload contains the end-of-message byte.
    #[error("Payload contains the terminator byte 0x{0:02x}")]
    TerminatorInPayload(u8),

    /// A polling deadline elapsed before the peer responded.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// Invalid transport configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Codec(format!("malformed base64 payload: {}", e))
    }
}
