//! In-memory shared store.
//!
//! Clones share the same objects, so two peers on different threads can talk
//! through one `MemoryMedium`.

use crate::error::{Error, Result};
use crate::storage::{ContentAccess, ObjectId, Properties, PropertyAccess, StorageMedium};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default property value size, matching common cloud metadata limits.
pub const DEFAULT_UNIT_SIZE: usize = 75;

/// Default number of payload properties per object.
pub const DEFAULT_UNIT_COUNT: usize = 30;

#[derive(Debug, Clone, Default)]
struct MemoryObject {
    content: Vec<u8>,
    properties: Properties,
}

/// Thread-safe in-memory object store.
#[derive(Debug, Clone)]
pub struct MemoryMedium {
    objects: Arc<Mutex<BTreeMap<ObjectId, MemoryObject>>>,
    unit_size: usize,
    unit_count: usize,
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMedium {
    /// Create an empty store with default property capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_UNIT_SIZE, DEFAULT_UNIT_COUNT)
    }

    /// Create an empty store with custom property capacity.
    pub fn with_capacity(unit_size: usize, unit_count: usize) -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            unit_size,
            unit_count,
        }
    }

    /// Create a store holding `count` objects named `obj-0000`, `obj-0001`, ...
    pub fn with_objects(count: usize) -> Self {
        let medium = Self::new();
        medium.populate(count);
        medium
    }

    /// Add `count` numbered objects with short distinct contents.
    pub fn populate(&self, count: usize) {
        for i in 0..count {
            self.insert(&format!("obj-{:04}", i), format!("cover {}", i).as_bytes());
        }
    }

    /// Insert or replace an object's content.
    pub fn insert(&self, id: &str, content: &[u8]) {
        self.lock()
            .entry(id.to_string())
            .or_default()
            .content = content.to_vec();
    }

    /// Number of objects in the store.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ObjectId, MemoryObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StorageMedium for MemoryMedium {
    fn list_objects(&self) -> Result<Vec<ObjectId>> {
        // BTreeMap keys are already sorted.
        Ok(self.lock().keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl ContentAccess for MemoryMedium {
    fn read_bytes(&self, id: &str) -> Result<Vec<u8>> {
        self.lock()
            .get(id)
            .map(|o| o.content.clone())
            .ok_or_else(|| Error::ObjectNotFound(id.to_string()))
    }

    fn write_bytes(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut objects = self.lock();
        let object = objects
            .get_mut(id)
            .ok_or_else(|| Error::ObjectNotFound(id.to_string()))?;
        object.content = data.to_vec();
        Ok(())
    }
}

impl PropertyAccess for MemoryMedium {
    fn read_properties(&self, id: &str) -> Result<Properties> {
        self.lock()
            .get(id)
            .map(|o| o.properties.clone())
            .ok_or_else(|| Error::ObjectNotFound(id.to_string()))
    }

    fn write_properties(&self, id: &str, properties: &Properties) -> Result<()> {
        let mut objects = self.lock();
        let object = objects
            .get_mut(id)
            .ok_or_else(|| Error::ObjectNotFound(id.to_string()))?;
        object.properties = properties.clone();
        Ok(())
    }

    fn unit_size(&self) -> usize {
        self.unit_size
    }

    fn unit_count(&self) -> usize {
        self.unit_count
    }
}
