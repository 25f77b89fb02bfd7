//! CRC-32 helpers shared by the counter, the checksum signal and the byte codec.
//!
//! The reduced checksum byte (`crc32 % 256`) is the tunable value: appending
//! filler bytes to a blob changes it until it lands on the wanted value.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Byte appended while tuning a blob's checksum.
pub const FILLER_BYTE: u8 = b' ';

/// Full 32-bit CRC of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// The tunable byte of `data`: its CRC-32 modulo 256.
pub fn reduce_byte(data: &[u8]) -> u8 {
    (crc32(data) % 256) as u8
}

/// Append filler bytes to `data` until its reduced checksum equals `desired`.
///
/// The result always starts with `data`. Fails with a codec error if more than
/// `ceiling` filler bytes would be needed.
///
/// # Example
///
/// ```
/// use covert_vfs::checksum::{reduce_byte, tune_to_byte};
///
/// let tuned = tune_to_byte(b"cover text", 42, 65_536).unwrap();
/// assert_eq!(reduce_byte(&tuned), 42);
/// assert!(tuned.starts_with(b"cover text"));
/// ```
pub fn tune_to_byte(data: &[u8], desired: u8, ceiling: usize) -> Result<Vec<u8>> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);

    let mut appended = 0usize;
    while (hasher.clone().finalize() % 256) as u8 != desired {
        if appended == ceiling {
            return Err(Error::Codec(format!(
                "checksum tuning to {} exceeded {} filler bytes",
                desired, ceiling
            )));
        }
        hasher.update(&[FILLER_BYTE]);
        appended += 1;
    }

    let mut tuned = Vec::with_capacity(data.len() + appended);
    tuned.extend_from_slice(data);
    tuned.resize(data.len() + appended, FILLER_BYTE);
    Ok(tuned)
}

/// Full CRC-32 as 4 little-endian bytes.
pub fn digest(data: &[u8]) -> [u8; 4] {
    crc32(data).to_le_bytes()
}

/// Base64 of [`digest`], truncated to `size` characters.
///
/// With the default size of 4 only 24 of the 32 CRC bits survive. The frame
/// format depends on this, so peers must agree on `size`.
pub fn short_digest(data: &[u8], size: usize) -> Vec<u8> {
    let mut encoded = BASE64.encode(digest(data)).into_bytes();
    encoded.truncate(size);
    encoded
}
