//! Payload chunks packed into numbered object properties.

use crate::codec::Codec;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::storage::{Properties, PropertyAccess};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Splits data into `unit_size` chunks stored base64-encoded as
/// `<prefix>0`, `<prefix>1`, ...
#[derive(Debug, Clone)]
pub struct PropertyChunkCodec<M> {
    medium: M,
    prefix: String,
    terminator: u8,
}

impl<M: PropertyAccess> PropertyChunkCodec<M> {
    pub fn new(medium: M, config: &TransportConfig) -> Self {
        Self {
            medium,
            prefix: config.property_prefix.clone(),
            terminator: config.terminator,
        }
    }

    fn key(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }
}

impl<M: PropertyAccess> Codec for PropertyChunkCodec<M> {
    fn encode(&self, object: &str, data: &[u8]) -> Result<()> {
        let unit_size = self.medium.unit_size();
        if unit_size == 0 {
            return Err(Error::Codec("medium has zero property size".to_string()));
        }

        let chunks: Vec<&[u8]> = data.chunks(unit_size).collect();
        if chunks.len() > self.medium.unit_count() {
            return Err(Error::Codec(format!(
                "{} bytes need {} properties, {} allowed",
                data.len(),
                chunks.len(),
                self.medium.unit_count()
            )));
        }

        let properties: Properties = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (self.key(i), BASE64.encode(chunk)))
            .collect();
        self.medium.write_properties(object, &properties)
    }

    fn decode(&self, object: &str) -> Result<Vec<u8>> {
        let properties = self.medium.read_properties(object)?;
        let mut decoded = Vec::new();

        for index in 0..self.medium.unit_count() {
            let Some(value) = properties.get(&self.key(index)) else {
                break;
            };
            decoded.extend(BASE64.decode(value)?);
            if decoded.contains(&self.terminator) {
                break;
            }
        }

        Ok(decoded)
    }

    fn unit_capacity(&self) -> usize {
        self.medium.unit_size() * self.medium.unit_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMedium;

    fn small_codec() -> (MemoryMedium, PropertyChunkCodec<MemoryMedium>) {
        let medium = MemoryMedium::with_capacity(4, 3);
        medium.populate(2);
        let codec = PropertyChunkCodec::new(medium.clone(), &TransportConfig::default());
        (medium, codec)
    }

    #[test]
    fn test_capacity() {
        let medium = MemoryMedium::with_capacity(75, 30);
        let codec = PropertyChunkCodec::new(medium, &TransportConfig::default());
        assert_eq!(codec.unit_capacity(), 2250);
    }

    #[test]
    fn test_chunks_are_numbered_base64() {
        let (medium, codec) = small_codec();
        codec.encode("obj-0001", b"abcdefghij").unwrap();

        let props = medium.read_properties("obj-0001").unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props["hash_0"], "YWJjZA==");
        assert_eq!(props["hash_1"], "ZWZnaA==");
        assert_eq!(props["hash_2"], "aWo=");
        assert_eq!(codec.decode("obj-0001").unwrap(), b"abcdefghij");
    }

    #[test]
    fn test_encode_replaces_previous_chunks() {
        let (_, codec) = small_codec();
        codec.encode("obj-0001", b"abcdefghij").unwrap();
        codec.encode("obj-0001", b"xy").unwrap();
        assert_eq!(codec.decode("obj-0001").unwrap(), b"xy");
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let (medium, codec) = small_codec();
        let mut props = Properties::new();
        props.insert("hash_0".to_string(), BASE64.encode(b"ab\x04"));
        props.insert("hash_1".to_string(), BASE64.encode(b"zz"));
        medium.write_properties("obj-0001", &props).unwrap();

        assert_eq!(codec.decode("obj-0001").unwrap(), b"ab\x04");
    }

    #[test]
    fn test_decode_stops_at_gap() {
        let (medium, codec) = small_codec();
        let mut props = Properties::new();
        props.insert("hash_0".to_string(), BASE64.encode(b"ab"));
        props.insert("hash_2".to_string(), BASE64.encode(b"zz"));
        medium.write_properties("obj-0001", &props).unwrap();

        assert_eq!(codec.decode("obj-0001").unwrap(), b"ab");
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let (_, codec) = small_codec();
        assert!(matches!(
            codec.encode("obj-0001", &[7u8; 13]),
            Err(Error::Codec(_))
        ));
    }

    #[test]
    fn test_malformed_base64() {
        let (medium, codec) = small_codec();
        let mut props = Properties::new();
        props.insert("hash_0".to_string(), "not base64!".to_string());
        medium.write_properties("obj-0001", &props).unwrap();

        assert!(matches!(codec.decode("obj-0001"), Err(Error::Codec(_))));
    }

    #[test]
    fn test_no_properties_decodes_empty() {
        let (_, codec) = small_codec();
        assert!(codec.decode("obj-0000").unwrap().is_empty());
    }
}
