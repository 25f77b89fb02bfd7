//! Channel negotiation over a shared store.
//!
//! Peers share the store's sorted object list. Index 0 holds the global
//! client counter; the remaining objects are split into equal slices, one per
//! channel position. The first object of a slice carries the control signal.

mod allocator;
mod deadline;
mod signal;

pub use allocator::{partition_count, Channel, ChannelAllocator, PartitionInfo};
pub use deadline::Deadline;
pub use signal::{ChecksumSignal, PropertySignal, Signal, SignalChannel, SignalEncoding};
