//! Storage layer for shared object stores.
//!
//! A store is any medium both peers can see. Backends implement:
//! - [`StorageMedium`]: deterministic, sorted object enumeration
//! - [`ContentAccess`]: raw byte content per object
//! - [`PropertyAccess`]: a string→string property map per object
//!
//! The transport only asks for the capabilities its chosen codec and signal
//! encoding need.

mod directory;
mod maintenance;
mod memory;

pub use directory::{DirectoryMedium, DIRECTORY_UNIT_COUNT, DIRECTORY_UNIT_SIZE};
pub use maintenance::{clear_all_properties, seed_directory};
pub use memory::{MemoryMedium, DEFAULT_UNIT_COUNT, DEFAULT_UNIT_SIZE};

use crate::error::Result;
use std::collections::BTreeMap;

/// Identifier of one object in a store (a relative path, a remote file id, ...).
pub type ObjectId = String;

/// Property map attached to one object.
pub type Properties = BTreeMap<String, String>;

/// Base capability: list the objects of the store.
pub trait StorageMedium: Send + Sync {
    /// All object identifiers, sorted lexicographically.
    ///
    /// Every peer must observe the same order, since partitions are computed
    /// from indices into this list.
    fn list_objects(&self) -> Result<Vec<ObjectId>>;

    /// Get the name of this backend (for logging).
    fn name(&self) -> &'static str;
}

/// Byte content access.
pub trait ContentAccess: StorageMedium {
    fn read_bytes(&self, id: &str) -> Result<Vec<u8>>;

    fn write_bytes(&self, id: &str, data: &[u8]) -> Result<()>;
}

/// Property map access.
pub trait PropertyAccess: StorageMedium {
    /// Read the properties this backend manages for `id`.
    fn read_properties(&self, id: &str) -> Result<Properties>;

    /// Replace the managed properties of `id` with `properties`.
    ///
    /// Previously set keys are removed first; this never merges.
    fn write_properties(&self, id: &str, properties: &Properties) -> Result<()>;

    /// Remove every managed property of `id`.
    fn clear_properties(&self, id: &str) -> Result<()> {
        self.write_properties(id, &Properties::new())
    }

    /// Bytes of payload one property value may carry (before base64).
    fn unit_size(&self) -> usize;

    /// Number of payload properties one object may carry.
    fn unit_count(&self) -> usize;
}
