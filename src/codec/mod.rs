//! Payload codecs: how one chunk of a batch is hidden in one object.
//!
//! - [`ByteSteganographyCodec`]: one byte per object, in the reduced checksum
//!   of the object's content
//! - [`PropertyChunkCodec`]: base64 chunks in numbered object properties

mod property;
mod steganography;

pub use property::PropertyChunkCodec;
pub use steganography::ByteSteganographyCodec;

use crate::error::Result;

/// Moves one unit of payload in and out of one storage object.
pub trait Codec {
    /// Hide `data` (at most [`Codec::unit_capacity`] bytes) in `object`.
    fn encode(&self, object: &str, data: &[u8]) -> Result<()>;

    /// Recover the data hidden in `object`.
    fn decode(&self, object: &str) -> Result<Vec<u8>>;

    /// Bytes one object carries per round.
    fn unit_capacity(&self) -> usize;
}
