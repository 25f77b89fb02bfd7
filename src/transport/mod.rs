//! Checksum-framed, ACK/NACK-driven message transport over a shared store.
//!
//! # Wire format
//!
//! ```text
//! message = payload || terminator
//! batch   = short_digest(chunk) || chunk        (chunk = next bytes of message)
//! batch   → split into unit_capacity pieces, one per data object of the slice
//! ```
//!
//! # Handshake
//!
//! ```text
//! sender:   wait CLEAR → write batch → DONE → wait ACK|NACK → (next | resend) … → CLEAR
//! receiver: wait DONE → decode + verify → ACK | NACK … until terminator
//! ```

use crate::channel::{
    Channel, ChannelAllocator, ChecksumSignal, Deadline, PartitionInfo, PropertySignal, Signal,
    SignalChannel, SignalEncoding,
};
use crate::checksum::short_digest;
use crate::codec::{ByteSteganographyCodec, Codec, PropertyChunkCodec};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::storage::{ContentAccess, PropertyAccess};
use tracing::{debug, info, warn};

/// Transport hiding one byte per object in content checksums.
pub type ChecksumTransport<M> =
    TransportProtocol<M, ByteSteganographyCodec<M>, ChecksumSignal<M>>;

/// Transport packing payload into object properties.
pub type PropertyTransport<M> = TransportProtocol<M, PropertyChunkCodec<M>, PropertySignal<M>>;

/// Payload bytes per batch once the digest prefix is paid for.
///
/// Fails with [`Error::Capacity`] if the objects cannot even hold the digest.
pub fn batch_capacity(unit_capacity: usize, objects: usize, checksum_size: usize) -> Result<usize> {
    let total = unit_capacity * objects;
    if total <= checksum_size {
        return Err(Error::Capacity {
            unit_capacity,
            objects,
            checksum_size,
        });
    }
    Ok(total - checksum_size)
}

/// One peer's end of a covert channel.
pub struct TransportProtocol<M, C, E> {
    channel: Channel,
    signals: SignalChannel<M, E>,
    codec: C,
    config: TransportConfig,
}

impl<M: ContentAccess + Clone> ChecksumTransport<M> {
    /// Content-checksum codec with a content-checksum signal.
    pub fn checksum(medium: M, config: TransportConfig) -> Result<Self> {
        let codec = ByteSteganographyCodec::new(medium.clone(), &config);
        let encoding = ChecksumSignal::new(medium.clone(), &config);
        Self::new(medium, codec, encoding, config)
    }
}

impl<M: ContentAccess + PropertyAccess + Clone> PropertyTransport<M> {
    /// Property codec with a property signal.
    pub fn property(medium: M, config: TransportConfig) -> Result<Self> {
        let codec = PropertyChunkCodec::new(medium.clone(), &config);
        let encoding = PropertySignal::new(medium.clone(), &config);
        Self::new(medium, codec, encoding, config)
    }
}

impl<M, C, E> TransportProtocol<M, C, E>
where
    M: ContentAccess,
    C: Codec,
    E: SignalEncoding,
{
    /// Assemble a transport from any codec and signal encoding.
    ///
    /// `medium` must hold at least one object: the first one stores the
    /// global client counter.
    pub fn new(medium: M, codec: C, encoding: E, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let allocator = ChannelAllocator::new(medium, &config)?;
        let signals = SignalChannel::new(allocator, encoding, &config);

        Ok(Self {
            channel: Channel::new(),
            signals,
            codec,
            config,
        })
    }

    /// Get the negotiated channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn allocator(&self) -> &ChannelAllocator<M> {
        self.signals.allocator()
    }

    /// Current partition layout of the store.
    pub fn partition_info(&self) -> Result<PartitionInfo> {
        self.allocator().partition_info()
    }

    /// Pick up a client count change now instead of at the next poll.
    pub fn refresh_partition(&mut self) -> Result<()> {
        self.signals.refresh_partition(&mut self.channel)
    }

    /// Claim the next position by incrementing the global client count.
    ///
    /// Returns the claimed position.
    pub fn connect(&mut self) -> Result<usize> {
        let position = self.allocator().increment_client_count()? as usize;
        self.claim(position)?;
        info!(position, "connected");
        Ok(position)
    }

    /// Wait for a peer to connect, without a deadline.
    pub fn wait_for_connection(&mut self) -> Result<usize> {
        self.wait_for_connection_until(Deadline::never())
    }

    /// Wait for a peer to connect, giving up at `deadline`.
    pub fn wait_for_connection_until(&mut self, deadline: Deadline) -> Result<usize> {
        let baseline = self.allocator().client_count()?;
        self.await_connection_after(baseline, deadline)
    }

    /// Wait until the client count moves away from `baseline`, then share
    /// the connecting peer's position (`baseline`).
    ///
    /// Reading the baseline before the peer may connect avoids missing the
    /// increment.
    pub fn await_connection_after(&mut self, baseline: u8, deadline: Deadline) -> Result<usize> {
        info!(baseline, "waiting for connection");
        while self.allocator().client_count()? == baseline {
            deadline.check("a connecting peer")?;
            std::thread::sleep(self.config.connection_poll());
        }

        let position = baseline as usize;
        self.claim(position)?;
        info!(position, "peer connected");
        Ok(position)
    }

    fn claim(&mut self, position: usize) -> Result<()> {
        self.channel.assign_position(position)?;
        self.signals.refresh_partition(&mut self.channel)?;
        self.signals.set_signal(&mut self.channel, Signal::Clear)
    }

    /// Send one message, waiting indefinitely for the peer.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.write_until(data, Deadline::never())
    }

    /// Send one message, giving up at `deadline`.
    ///
    /// Batches rejected by the receiver are resent until acknowledged.
    pub fn write_until(&mut self, data: &[u8], deadline: Deadline) -> Result<()> {
        let terminator = self.config.terminator;
        if data.contains(&terminator) {
            return Err(Error::TerminatorInPayload(terminator));
        }

        self.signals
            .wait_for(&mut self.channel, |s| s == Signal::Clear, deadline, "CLEAR before write")?;

        let objects = self.channel.data_objects().to_vec();
        let unit = self.codec.unit_capacity();
        let checksum_size = self.config.checksum_size;
        let per_batch = batch_capacity(unit, objects.len(), checksum_size)?;

        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.extend_from_slice(data);
        payload.push(terminator);
        let batches: Vec<&[u8]> = payload.chunks(per_batch).collect();

        let mut index = 0;
        while index < batches.len() {
            let batch = batches[index];
            let digest = short_digest(batch, checksum_size);

            let mut framed = Vec::with_capacity(digest.len() + batch.len());
            framed.extend_from_slice(&digest);
            framed.extend_from_slice(batch);

            for (object, chunk) in objects.iter().zip(framed.chunks(unit)) {
                self.codec.encode(object, chunk)?;
            }
            self.signals.set_signal(&mut self.channel, Signal::Done)?;
            debug!(
                batch = index,
                of = batches.len(),
                bytes = framed.len(),
                digest = %hex::encode(&digest),
                "batch sent"
            );

            let reply = self.signals.wait_for(
                &mut self.channel,
                |s| matches!(s, Signal::Ack | Signal::Nack),
                deadline,
                "ACK or NACK",
            )?;
            if reply == Signal::Ack {
                index += 1;
            } else {
                warn!(batch = index, "batch rejected, resending");
            }
        }

        self.signals.set_signal(&mut self.channel, Signal::Clear)?;
        info!(bytes = data.len(), batches = batches.len(), "message sent");
        Ok(())
    }

    /// Receive one message, waiting indefinitely for the peer.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        self.read_until(Deadline::never())
    }

    /// Receive one message, giving up at `deadline`.
    ///
    /// Batches failing digest verification are NACKed and read again once
    /// the sender resends them.
    pub fn read_until(&mut self, deadline: Deadline) -> Result<Vec<u8>> {
        let terminator = self.config.terminator;
        let checksum_size = self.config.checksum_size;
        let mut data = Vec::new();
        let mut batches = 0usize;

        loop {
            self.signals
                .wait_for(&mut self.channel, |s| s == Signal::Done, deadline, "DONE")?;

            let objects = self.channel.data_objects().to_vec();
            let mut current = Vec::new();
            for object in &objects {
                current.extend(self.codec.decode(object)?);
                if current.contains(&terminator) {
                    break;
                }
            }

            if verify_batch(&current, checksum_size) {
                data.extend_from_slice(&current[checksum_size..]);
                self.signals.set_signal(&mut self.channel, Signal::Ack)?;
                debug!(batch = batches, bytes = current.len(), "batch accepted");
                batches += 1;
            } else {
                self.signals.set_signal(&mut self.channel, Signal::Nack)?;
                warn!(batch = batches, bytes = current.len(), "batch failed verification");
            }

            if let Some(end) = data.iter().position(|&b| b == terminator) {
                data.truncate(end);
                info!(bytes = data.len(), batches, "message received");
                return Ok(data);
            }
        }
    }
}

/// True if the batch's digest prefix matches the rest of the batch.
fn verify_batch(batch: &[u8], checksum_size: usize) -> bool {
    if batch.len() < checksum_size {
        return false;
    }
    let (received, body) = batch.split_at(checksum_size);
    short_digest(body, checksum_size) == received
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::storage::MemoryMedium;
    use std::time::Duration;

    #[test]
    fn test_batch_capacity_byte_codec_too_small() {
        let result = batch_capacity(1, 3, 4);
        assert!(matches!(
            result,
            Err(Error::Capacity {
                unit_capacity: 1,
                objects: 3,
                checksum_size: 4
            })
        ));
        // Exactly the checksum leaves no room for payload either.
        assert!(batch_capacity(1, 4, 4).is_err());
        assert_eq!(batch_capacity(1, 5, 4).unwrap(), 1);
    }

    #[test]
    fn test_batch_capacity_property_codec() {
        let medium = MemoryMedium::with_capacity(75, 30);
        let codec = PropertyChunkCodec::new(medium, &TransportConfig::default());
        assert_eq!(batch_capacity(codec.unit_capacity(), 1, 4).unwrap(), 2246);
    }

    #[test]
    fn test_verify_batch() {
        let mut framed = short_digest(b"payload\x04", 4);
        framed.extend_from_slice(b"payload\x04");
        assert!(verify_batch(&framed, 4));

        framed[5] ^= 0x01;
        assert!(!verify_batch(&framed, 4));
        assert!(!verify_batch(b"ab", 4));
    }

    #[test]
    fn test_operations_require_connection() {
        let medium = MemoryMedium::with_objects(8);
        let mut transport = ChecksumTransport::checksum(medium, TransportConfig::fast()).unwrap();

        assert!(matches!(transport.write(b"hi"), Err(Error::NotConnected)));
        assert!(matches!(transport.read(), Err(Error::NotConnected)));
    }

    #[test]
    fn test_write_rejects_terminator() {
        let medium = MemoryMedium::with_objects(8);
        let mut transport = ChecksumTransport::checksum(medium, TransportConfig::fast()).unwrap();
        transport.allocator().set_client_count(0).unwrap();
        transport.connect().unwrap();

        assert!(matches!(
            transport.write(b"bad\x04payload"),
            Err(Error::TerminatorInPayload(0x04))
        ));
    }

    #[test]
    fn test_write_fails_on_small_slice() {
        // Counter object + sync object + 3 data objects.
        let medium = MemoryMedium::with_objects(5);
        let mut transport = ChecksumTransport::checksum(medium, TransportConfig::fast()).unwrap();
        transport.allocator().set_client_count(0).unwrap();
        transport.connect().unwrap();

        assert_eq!(transport.channel().data_objects().len(), 3);
        assert!(matches!(
            transport.write(b"x"),
            Err(Error::Capacity { objects: 3, .. })
        ));
    }

    #[test]
    fn test_connect_claims_counter_value() {
        let medium = MemoryMedium::with_objects(9);
        let mut first = ChecksumTransport::checksum(medium.clone(), TransportConfig::fast()).unwrap();
        first.allocator().set_client_count(0).unwrap();
        let mut second = ChecksumTransport::checksum(medium, TransportConfig::fast()).unwrap();

        assert_eq!(first.connect().unwrap(), 0);
        assert_eq!(second.connect().unwrap(), 1);
        assert_eq!(second.partition_info().unwrap().partition_count, 2);
        assert_eq!(second.channel().virtual_slice(), ["obj-0005", "obj-0006", "obj-0007", "obj-0008"]);
    }

    #[test]
    fn test_wait_for_connection_times_out() {
        let medium = MemoryMedium::with_objects(8);
        let mut transport = ChecksumTransport::checksum(medium, TransportConfig::fast()).unwrap();

        let result = transport.wait_for_connection_until(Deadline::after(Duration::from_millis(10)));
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(!transport.channel().is_connected());
    }

    #[test]
    fn test_read_times_out_without_sender() {
        let medium = MemoryMedium::with_objects(8);
        let mut transport = ChecksumTransport::checksum(medium, TransportConfig::fast()).unwrap();
        transport.allocator().set_client_count(0).unwrap();
        transport.connect().unwrap();

        let result = transport.read_until(Deadline::after(Duration::from_millis(20)));
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
