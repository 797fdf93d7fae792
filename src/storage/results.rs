//! Storage result types
//!
//! Defines the object value returned by storage operations.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use crate::error::StorageError;
use crate::storage::interface::ObjectStorage;

/// An object known to a storage backend.
///
/// Holds a weak handle to the backend that produced it, so an object never
/// keeps its storage alive.
#[derive(Clone)]
pub struct StoredObject {
    /// Key relative to the storage base, `/`-separated
    pub path: String,
    /// Last segment of the key
    pub name: String,
    /// Set when the object came from a listing or stat
    pub last_modified: Option<SystemTime>,
    pub size: Option<u64>,
    storage: Weak<dyn ObjectStorage>,
}

impl StoredObject {
    pub fn new(path: impl Into<String>, storage: Weak<dyn ObjectStorage>) -> Self {
        let path = path.into();
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());

        Self {
            path,
            name,
            last_modified: None,
            size: None,
            storage,
        }
    }

    pub fn with_last_modified(mut self, last_modified: Option<SystemTime>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// The owning backend, if it is still alive
    pub fn storage(&self) -> Option<Arc<dyn ObjectStorage>> {
        self.storage.upgrade()
    }

    /// Re-open the object through its backend. `None` once the backend is gone.
    pub fn open(&self) -> Option<Result<Box<dyn Read + Send>, StorageError>> {
        self.storage().map(|storage| storage.get(&self.path))
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("last_modified", &self.last_modified)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl PartialEq for StoredObject {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.name == other.name
            && self.last_modified == other.last_modified
            && self.size == other.size
    }
}
