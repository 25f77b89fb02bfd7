//! One payload byte per object, hidden in the content checksum.

use crate::checksum::{reduce_byte, tune_to_byte};
use crate::codec::Codec;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::storage::ContentAccess;

/// Tunes each object's content so its reduced CRC-32 equals the payload byte.
///
/// Content only ever grows by trailing filler bytes; the original bytes stay
/// in place.
#[derive(Debug, Clone)]
pub struct ByteSteganographyCodec<M> {
    medium: M,
    tune_ceiling: usize,
}

impl<M: ContentAccess> ByteSteganographyCodec<M> {
    pub fn new(medium: M, config: &TransportConfig) -> Self {
        Self {
            medium,
            tune_ceiling: config.tune_ceiling,
        }
    }
}

impl<M: ContentAccess> Codec for ByteSteganographyCodec<M> {
    fn encode(&self, object: &str, data: &[u8]) -> Result<()> {
        let byte = *data
            .first()
            .ok_or_else(|| Error::Codec("no byte to encode".to_string()))?;
        let content = self.medium.read_bytes(object)?;
        let tuned = tune_to_byte(&content, byte, self.tune_ceiling)?;
        self.medium.write_bytes(object, &tuned)
    }

    fn decode(&self, object: &str) -> Result<Vec<u8>> {
        let content = self.medium.read_bytes(object)?;
        Ok(vec![reduce_byte(&content)])
    }

    fn unit_capacity(&self) -> usize {
        1
    }
}
