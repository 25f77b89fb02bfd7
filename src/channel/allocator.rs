//! Client counting and geometric partitioning of the store.

use crate::checksum::{reduce_byte, tune_to_byte};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::storage::{ContentAccess, ObjectId};
use std::ops::Range;
use tracing::{debug, info};

/// Number of partitions for `client_count` active clients.
///
/// The smallest power of two at least `client_count`, so slices only
/// shrink when the count crosses a power of two.
pub fn partition_count(client_count: usize) -> usize {
    if client_count <= 1 {
        1
    } else {
        client_count.next_power_of_two()
    }
}

/// Partition layout for a given store size and client count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Objects in the store, including the counter object.
    pub total_objects: usize,
    /// Global client counter value.
    pub client_count: u8,
    /// Number of equal slices the store is split into.
    pub partition_count: usize,
    /// Objects in each slice (sync object included).
    pub objects_per_channel: usize,
}

impl PartitionInfo {
    pub fn compute(total_objects: usize, client_count: u8) -> Self {
        let partition_count = partition_count(client_count as usize);
        Self {
            total_objects,
            client_count,
            partition_count,
            objects_per_channel: total_objects.saturating_sub(1) / partition_count,
        }
    }

    /// Indices into the sorted object list owned by `position`.
    pub fn slice_range(&self, position: usize) -> Result<Range<usize>> {
        if self.objects_per_channel == 0 {
            return Err(Error::Partition(format!(
                "{} objects cannot be split into {} partitions",
                self.total_objects, self.partition_count
            )));
        }

        let start = position * self.objects_per_channel + 1;
        let end = start + self.objects_per_channel;
        if end > self.total_objects {
            return Err(Error::Partition(format!(
                "position {} is outside the {} partitions for {} clients",
                position, self.partition_count, self.client_count
            )));
        }
        Ok(start..end)
    }
}

/// One peer's negotiated session.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// Slice index, assigned once at connect time.
    position: Option<usize>,
    /// Counter value the current slice was computed from.
    client_count: Option<u8>,
    /// Objects owned by this channel, in store order.
    virtual_slice: Vec<ObjectId>,
}

impl Channel {
    /// A channel that has not connected yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice index, if connected.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Whether a position has been assigned.
    pub fn is_connected(&self) -> bool {
        self.position.is_some()
    }

    /// Assign the channel position. A position never changes once set.
    pub fn assign_position(&mut self, position: usize) -> Result<()> {
        match self.position {
            Some(current) if current != position => Err(Error::Partition(format!(
                "channel already positioned at {}",
                current
            ))),
            _ => {
                self.position = Some(position);
                Ok(())
            }
        }
    }

    /// Counter value the current slice was computed from.
    pub fn client_count(&self) -> Option<u8> {
        self.client_count
    }

    /// Objects owned by this channel, sync object first.
    pub fn virtual_slice(&self) -> &[ObjectId] {
        &self.virtual_slice
    }

    /// The object carrying the control signal.
    pub fn sync_object(&self) -> Result<&str> {
        if self.position.is_none() {
            return Err(Error::NotConnected);
        }
        self.virtual_slice
            .first()
            .map(String::as_str)
            .ok_or_else(|| Error::Partition("channel has no slice yet".to_string()))
    }

    /// The payload-carrying objects: the slice without its sync object.
    pub fn data_objects(&self) -> &[ObjectId] {
        self.virtual_slice.get(1..).unwrap_or(&[])
    }
}

/// Reads and advances the global client counter and assigns slices.
///
/// The counter lives in the reduced checksum byte of the first object of the
/// store.
#[derive(Debug, Clone)]
pub struct ChannelAllocator<M> {
    medium: M,
    config_object: ObjectId,
    tune_ceiling: usize,
}

impl<M: ContentAccess> ChannelAllocator<M> {
    /// Resolve the counter object (the first object of the store).
    pub fn new(medium: M, config: &TransportConfig) -> Result<Self> {
        let config_object = medium
            .list_objects()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Partition("store holds no objects".to_string()))?;

        debug!(medium = medium.name(), object = %config_object, "counter object resolved");

        Ok(Self {
            medium,
            config_object,
            tune_ceiling: config.tune_ceiling,
        })
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn config_object(&self) -> &str {
        &self.config_object
    }

    /// Current global client count.
    pub fn client_count(&self) -> Result<u8> {
        let content = self.medium.read_bytes(&self.config_object)?;
        Ok(reduce_byte(&content))
    }

    /// Tune the counter object so the global count reads `count`.
    pub fn set_client_count(&self, count: u8) -> Result<()> {
        let content = self.medium.read_bytes(&self.config_object)?;
        let tuned = tune_to_byte(&content, count, self.tune_ceiling)?;
        self.medium.write_bytes(&self.config_object, &tuned)?;
        debug!(count, "client count set");
        Ok(())
    }

    /// Increment the counter, returning the value before the increment.
    pub fn increment_client_count(&self) -> Result<u8> {
        let current = self.client_count()?;
        let next = current.checked_add(1).ok_or_else(|| {
            Error::Partition("client counter is saturated at 255".to_string())
        })?;
        self.set_client_count(next)?;
        Ok(current)
    }

    /// Reset the counter to zero, detaching every channel on the store.
    pub fn reset_client_count(&self) -> Result<()> {
        self.set_client_count(0)?;
        info!(medium = self.medium.name(), "client count reset");
        Ok(())
    }

    /// Partition layout for the current counter value.
    pub fn partition_info(&self) -> Result<PartitionInfo> {
        let total = self.medium.list_objects()?.len();
        Ok(PartitionInfo::compute(total, self.client_count()?))
    }

    /// Recompute the channel's slice if the global count moved.
    ///
    /// Returns `true` when the slice was reassigned; the caller must reset the
    /// new sync object.
    pub fn refresh(&self, channel: &mut Channel) -> Result<bool> {
        let position = channel.position.ok_or(Error::NotConnected)?;
        let count = self.client_count()?;
        if channel.client_count == Some(count) && !channel.virtual_slice.is_empty() {
            return Ok(false);
        }

        let objects = self.medium.list_objects()?;
        let layout = PartitionInfo::compute(objects.len(), count);
        let range = layout.slice_range(position)?;

        channel.virtual_slice = objects[range.clone()].to_vec();
        channel.client_count = Some(count);

        info!(
            position,
            clients = count,
            partitions = layout.partition_count,
            start = range.start,
            end = range.end,
            sync = %channel.virtual_slice[0],
            "partition assigned"
        );
        Ok(true)
    }
}
