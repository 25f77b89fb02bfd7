//! Local directory store.
//!
//! Every regular, non-hidden file under the root is an object, identified by
//! its `/`-separated path relative to the root. Properties live in a hidden
//! JSON sidecar (`.<file name>.props`) beside each object, so they never show
//! up as objects themselves.

use crate::error::{Error, Result};
use crate::storage::{ContentAccess, ObjectId, Properties, PropertyAccess, StorageMedium};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Bytes of payload per sidecar property.
pub const DIRECTORY_UNIT_SIZE: usize = 256;

/// Payload properties per object.
pub const DIRECTORY_UNIT_COUNT: usize = 10;

/// Sidecar file suffix.
const SIDECAR_SUFFIX: &str = ".props";

/// Store backed by a directory tree (local disk, NFS or a synced folder).
#[derive(Debug, Clone)]
pub struct DirectoryMedium {
    /// Root directory containing the cover files.
    root_dir: PathBuf,
}

impl DirectoryMedium {
    /// Open a directory as a store.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::InvalidRoot(root.to_path_buf()));
        }

        Ok(Self {
            root_dir: root.to_path_buf(),
        })
    }

    /// Get the root directory.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Resolve an object id to its file, refusing anything outside the root.
    fn object_path(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if id.is_empty() || escapes || is_hidden(relative) {
            return Err(Error::ObjectNotFound(id.to_string()));
        }

        let path = self.root_dir.join(relative);
        if !path.is_file() {
            return Err(Error::ObjectNotFound(id.to_string()));
        }
        Ok(path)
    }

    /// Sidecar path for an object file.
    fn sidecar_path(object: &Path) -> PathBuf {
        let name = object
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        object.with_file_name(format!(".{}{}", name, SIDECAR_SUFFIX))
    }
}

/// Replace `path` in one step so a concurrent reader never sees a partial file.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(".{}.tmp", name.trim_start_matches('.')));
    std::fs::write(&staging, data)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}

/// True if any component of the path starts with a dot.
fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

impl StorageMedium for DirectoryMedium {
    fn list_objects(&self) -> Result<Vec<ObjectId>> {
        let mut objects = Vec::new();

        let walker = WalkDir::new(&self.root_dir)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| Error::Storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root_dir)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            objects.push(id);
        }

        objects.sort();
        Ok(objects)
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

impl ContentAccess for DirectoryMedium {
    fn read_bytes(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.object_path(id)?;
        Ok(std::fs::read(path)?)
    }

    fn write_bytes(&self, id: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(id)?;
        atomic_write(&path, data)
    }
}

impl PropertyAccess for DirectoryMedium {
    fn read_properties(&self, id: &str) -> Result<Properties> {
        let sidecar = Self::sidecar_path(&self.object_path(id)?);
        if !sidecar.exists() {
            return Ok(Properties::new());
        }

        let content = std::fs::read_to_string(&sidecar)?;
        let properties: Properties = serde_json::from_str(&content)?;
        Ok(properties)
    }

    fn write_properties(&self, id: &str, properties: &Properties) -> Result<()> {
        let sidecar = Self::sidecar_path(&self.object_path(id)?);

        if properties.is_empty() {
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
            return Ok(());
        }

        let content = serde_json::to_string(properties)?;
        atomic_write(&sidecar, content.as_bytes())
    }

    fn unit_size(&self) -> usize {
        DIRECTORY_UNIT_SIZE
    }

    fn unit_count(&self) -> usize {
        DIRECTORY_UNIT_COUNT
    }
}
