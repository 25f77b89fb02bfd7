//! Message conventions layered on top of the transport by an operator shell.
//!
//! The transport moves opaque messages; a shell sends command strings and
//! reads replies. Two exchanges carry file data:
//!
//! ```text
//! download <remote-path>            → "<status> <base64>" | "failed"
//! upload <remote-path> <base64>     → "failed" | anything else on success
//! ```
//!
//! Base64 keeps file bytes clear of the message terminator.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Reply sentinel for a failed exchange.
pub const FAILED: &str = "failed";

/// Status word of a successful download reply.
pub const SUCCESS: &str = "success";

/// Build a `download <path>` request.
pub fn download_request(path: &str) -> Vec<u8> {
    format!("download {}", path).into_bytes()
}

/// Reply to a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadReply {
    /// File contents.
    Success(Vec<u8>),
    /// The remote side could not read the file.
    Failed,
}

impl DownloadReply {
    pub fn to_message(&self) -> Vec<u8> {
        match self {
            DownloadReply::Success(data) => {
                format!("{} {}", SUCCESS, BASE64.encode(data)).into_bytes()
            }
            DownloadReply::Failed => FAILED.as_bytes().to_vec(),
        }
    }

    /// Parse a reply; any status other than `failed` carries data.
    pub fn parse(message: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(message)
            .map_err(|_| Error::Codec("download reply is not UTF-8".to_string()))?;
        let mut parts = text.split_whitespace();

        match parts.next() {
            None | Some(FAILED) => Ok(DownloadReply::Failed),
            Some(_) => {
                let encoded = parts.next().unwrap_or("");
                Ok(DownloadReply::Success(BASE64.decode(encoded)?))
            }
        }
    }
}

/// `upload <destination> <base64>` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub destination: String,
    pub payload: Vec<u8>,
}

impl UploadRequest {
    pub fn new(destination: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            destination: destination.into(),
            payload,
        }
    }

    pub fn to_message(&self) -> Vec<u8> {
        format!("upload {} {}", self.destination, BASE64.encode(&self.payload)).into_bytes()
    }

    pub fn parse(message: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(message)
            .map_err(|_| Error::Codec("upload request is not UTF-8".to_string()))?;
        let mut parts = text.splitn(3, ' ');

        match (parts.next(), parts.next(), parts.next()) {
            (Some("upload"), Some(destination), Some(encoded)) if !destination.is_empty() => {
                Ok(Self {
                    destination: destination.to_string(),
                    payload: BASE64.decode(encoded.trim())?,
                })
            }
            _ => Err(Error::Codec(format!("malformed upload request: {:.32}", text))),
        }
    }
}

/// Whether an upload reply reports success.
pub fn upload_succeeded(reply: &[u8]) -> bool {
    reply != FAILED.as_bytes()
}
