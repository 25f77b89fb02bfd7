//! Four-state control signal carried by a channel's sync object.

use crate::channel::allocator::{Channel, ChannelAllocator};
use crate::channel::deadline::Deadline;
use crate::checksum::{reduce_byte, tune_to_byte};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::storage::{ContentAccess, Properties, PropertyAccess};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Handshake state published by one peer and polled by the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    /// Idle; ready for the next batch or message.
    #[default]
    Clear = 0,
    /// Receiver accepted the batch.
    Ack = 1,
    /// Receiver rejected the batch; sender must resend it.
    Nack = 2,
    /// Sender finished writing a batch.
    Done = 3,
}

impl Signal {
    /// Decode a raw value; anything outside 0..=3 reads as `Clear`.
    pub fn from_byte(value: u8) -> Self {
        match value {
            1 => Signal::Ack,
            2 => Signal::Nack,
            3 => Signal::Done,
            _ => Signal::Clear,
        }
    }

    /// Raw value stored in a reduced checksum byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Uppercase name stored by the property encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Clear => "CLEAR",
            Signal::Ack => "ACK",
            Signal::Nack => "NACK",
            Signal::Done => "DONE",
        }
    }

    /// Decode a signal name (case-insensitive); unknown names read as `Clear`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "ACK" => Signal::Ack,
            "NACK" => Signal::Nack,
            "DONE" => Signal::Done,
            _ => Signal::Clear,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a signal is stored in the sync object.
pub trait SignalEncoding {
    /// Store `signal` in `sync_object`.
    fn encode(&self, sync_object: &str, signal: Signal) -> Result<()>;

    /// Read the signal stored in `sync_object`.
    ///
    /// Undecodable or absent values read as [`Signal::Clear`], including a
    /// property map the backend cannot parse; only storage failures are
    /// errors.
    fn decode(&self, sync_object: &str) -> Result<Signal>;

    /// Prepare an object that just became a sync object.
    fn prepare(&self, _sync_object: &str) -> Result<()> {
        Ok(())
    }
}

/// Signal stored in the reduced checksum byte of the sync object's content.
#[derive(Debug, Clone)]
pub struct ChecksumSignal<M> {
    medium: M,
    tune_ceiling: usize,
}

impl<M: ContentAccess> ChecksumSignal<M> {
    pub fn new(medium: M, config: &TransportConfig) -> Self {
        Self {
            medium,
            tune_ceiling: config.tune_ceiling,
        }
    }
}

impl<M: ContentAccess> SignalEncoding for ChecksumSignal<M> {
    fn encode(&self, sync_object: &str, signal: Signal) -> Result<()> {
        let content = self.medium.read_bytes(sync_object)?;
        let tuned = tune_to_byte(&content, signal.as_byte(), self.tune_ceiling)?;
        self.medium.write_bytes(sync_object, &tuned)
    }

    fn decode(&self, sync_object: &str) -> Result<Signal> {
        let content = self.medium.read_bytes(sync_object)?;
        Ok(Signal::from_byte(reduce_byte(&content)))
    }
}

/// Signal stored by name in a reserved property of the sync object.
#[derive(Debug, Clone)]
pub struct PropertySignal<M> {
    medium: M,
    key: String,
}

impl<M: PropertyAccess> PropertySignal<M> {
    pub fn new(medium: M, config: &TransportConfig) -> Self {
        Self {
            medium,
            key: config.signal_key.clone(),
        }
    }
}

impl<M: PropertyAccess> SignalEncoding for PropertySignal<M> {
    fn encode(&self, sync_object: &str, signal: Signal) -> Result<()> {
        let mut properties = Properties::new();
        properties.insert(self.key.clone(), signal.as_str().to_string());
        self.medium.write_properties(sync_object, &properties)
    }

    fn decode(&self, sync_object: &str) -> Result<Signal> {
        let properties = match self.medium.read_properties(sync_object) {
            Ok(properties) => properties,
            Err(Error::Serialization(e)) => {
                debug!(sync = %sync_object, error = %e, "unreadable sync properties");
                return Ok(Signal::Clear);
            }
            Err(e) => return Err(e),
        };
        Ok(properties
            .get(&self.key)
            .map(|name| Signal::from_name(name))
            .unwrap_or_default())
    }

    fn prepare(&self, sync_object: &str) -> Result<()> {
        // Drop payload left over from whoever used this object before.
        self.medium.clear_properties(sync_object)
    }
}

/// Partition-aware signal reads and writes with a fixed poll delay.
#[derive(Debug, Clone)]
pub struct SignalChannel<M, E> {
    allocator: ChannelAllocator<M>,
    encoding: E,
    poll_delay: Duration,
}

impl<M: ContentAccess, E: SignalEncoding> SignalChannel<M, E> {
    pub fn new(allocator: ChannelAllocator<M>, encoding: E, config: &TransportConfig) -> Self {
        Self {
            allocator,
            encoding,
            poll_delay: config.signal_poll(),
        }
    }

    pub fn allocator(&self) -> &ChannelAllocator<M> {
        &self.allocator
    }

    /// Recompute the slice if the client count moved, then reset the new
    /// sync object to `Clear`.
    pub fn refresh_partition(&self, channel: &mut Channel) -> Result<()> {
        if self.allocator.refresh(channel)? {
            let sync = channel.sync_object()?;
            self.encoding.prepare(sync)?;
            self.encoding.encode(sync, Signal::Clear)?;
            info!(sync = %sync, "sync object reset");
        }
        Ok(())
    }

    /// Wait one poll period, then read the current signal.
    pub fn read_signal(&self, channel: &mut Channel) -> Result<Signal> {
        std::thread::sleep(self.poll_delay);
        self.refresh_partition(channel)?;
        let signal = self.encoding.decode(channel.sync_object()?)?;
        trace!(signal = %signal, "signal observed");
        Ok(signal)
    }

    /// Publish a signal on the channel's (refreshed) sync object.
    pub fn set_signal(&self, channel: &mut Channel, signal: Signal) -> Result<()> {
        self.refresh_partition(channel)?;
        self.encoding.encode(channel.sync_object()?, signal)?;
        trace!(signal = %signal, "signal published");
        Ok(())
    }

    /// Poll until a signal accepted by `accept` appears.
    pub fn wait_for<F>(
        &self,
        channel: &mut Channel,
        accept: F,
        deadline: Deadline,
        what: &str,
    ) -> Result<Signal>
    where
        F: Fn(Signal) -> bool,
    {
        loop {
            let signal = self.read_signal(channel)?;
            if accept(signal) {
                return Ok(signal);
            }
            deadline.check(what)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DirectoryMedium, MemoryMedium, PropertyAccess};
    use tempfile::TempDir;

    fn connected_channel<E: SignalEncoding>(
        medium: &MemoryMedium,
        encoding: E,
    ) -> (SignalChannel<MemoryMedium, E>, Channel) {
        let config = TransportConfig::fast();
        let allocator = ChannelAllocator::new(medium.clone(), &config).unwrap();
        allocator.set_client_count(1).unwrap();
        let signals = SignalChannel::new(allocator, encoding, &config);

        let mut channel = Channel::new();
        channel.assign_position(0).unwrap();
        (signals, channel)
    }

    #[test]
    fn test_signal_byte_decode() {
        assert_eq!(Signal::from_byte(0), Signal::Clear);
        assert_eq!(Signal::from_byte(1), Signal::Ack);
        assert_eq!(Signal::from_byte(2), Signal::Nack);
        assert_eq!(Signal::from_byte(3), Signal::Done);
        for value in 4..=255u8 {
            assert_eq!(Signal::from_byte(value), Signal::Clear);
        }
    }

    #[test]
    fn test_signal_names() {
        for signal in [Signal::Clear, Signal::Ack, Signal::Nack, Signal::Done] {
            assert_eq!(Signal::from_name(signal.as_str()), signal);
        }
        assert_eq!(Signal::from_name("done"), Signal::Done);
        assert_eq!(Signal::from_name("garbage"), Signal::Clear);
        assert_eq!(Signal::from_name(""), Signal::Clear);
    }

    #[test]
    fn test_checksum_signal_roundtrip() {
        let medium = MemoryMedium::with_objects(6);
        let encoding = ChecksumSignal::new(medium.clone(), &TransportConfig::default());
        for signal in [Signal::Done, Signal::Ack, Signal::Nack, Signal::Clear] {
            encoding.encode("obj-0003", signal).unwrap();
            assert_eq!(encoding.decode("obj-0003").unwrap(), signal);
        }
    }

    #[test]
    fn test_property_signal_absent_is_clear() {
        let medium = MemoryMedium::with_objects(3);
        let encoding = PropertySignal::new(medium.clone(), &TransportConfig::default());
        assert_eq!(encoding.decode("obj-0001").unwrap(), Signal::Clear);

        let mut junk = Properties::new();
        junk.insert("sync_status".to_string(), "???".to_string());
        medium.write_properties("obj-0001", &junk).unwrap();
        assert_eq!(encoding.decode("obj-0001").unwrap(), Signal::Clear);
    }

    #[test]
    fn test_property_signal_malformed_sidecar_is_clear() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a0.txt"), b"counter").unwrap();
        std::fs::write(dir.path().join("b0.txt"), b"sync").unwrap();
        std::fs::write(dir.path().join(".b0.txt.props"), b"{not json").unwrap();

        let medium = DirectoryMedium::open(dir.path()).unwrap();
        let encoding = PropertySignal::new(medium, &TransportConfig::default());
        assert_eq!(encoding.decode("b0.txt").unwrap(), Signal::Clear);

        // Missing objects are still storage errors.
        assert!(matches!(
            encoding.decode("absent.txt"),
            Err(Error::ObjectNotFound(_))
        ));

        encoding.encode("b0.txt", Signal::Ack).unwrap();
        assert_eq!(encoding.decode("b0.txt").unwrap(), Signal::Ack);
    }

    #[test]
    fn test_set_then_read_signal() {
        let medium = MemoryMedium::with_objects(8);
        let (signals, mut channel) =
            connected_channel(&medium, ChecksumSignal::new(medium.clone(), &TransportConfig::default()));

        signals.set_signal(&mut channel, Signal::Done).unwrap();
        assert_eq!(channel.sync_object().unwrap(), "obj-0001");
        assert_eq!(signals.read_signal(&mut channel).unwrap(), Signal::Done);
    }

    #[test]
    fn test_refresh_clears_stale_properties() {
        let medium = MemoryMedium::with_objects(8);
        let mut stale = Properties::new();
        stale.insert("hash_0".to_string(), "c3RhbGU=".to_string());
        stale.insert("sync_status".to_string(), "DONE".to_string());
        medium.write_properties("obj-0001", &stale).unwrap();

        let (signals, mut channel) =
            connected_channel(&medium, PropertySignal::new(medium.clone(), &TransportConfig::default()));
        signals.refresh_partition(&mut channel).unwrap();

        let props = medium.read_properties("obj-0001").unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("sync_status").map(String::as_str), Some("CLEAR"));
    }

    #[test]
    fn test_unconnected_channel_fails() {
        let medium = MemoryMedium::with_objects(4);
        let config = TransportConfig::fast();
        let allocator = ChannelAllocator::new(medium.clone(), &config).unwrap();
        let signals = SignalChannel::new(allocator, ChecksumSignal::new(medium, &config), &config);

        let mut channel = Channel::new();
        assert!(matches!(
            signals.read_signal(&mut channel),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            signals.set_signal(&mut channel, Signal::Ack),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_wait_for_times_out() {
        let medium = MemoryMedium::with_objects(4);
        let (signals, mut channel) =
            connected_channel(&medium, ChecksumSignal::new(medium.clone(), &TransportConfig::default()));

        let result = signals.wait_for(
            &mut channel,
            |s| s == Signal::Done,
            Deadline::after(Duration::from_millis(20)),
            "DONE",
        );
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
