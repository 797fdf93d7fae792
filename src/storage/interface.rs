//! Storage interface
//!
//! The capability set every object storage backend provides, so callers can
//! swap the local disk store for another backend.

use std::io::Read;

use crate::error::StorageError;
use crate::storage::results::StoredObject;

/// Flat object namespace with put/get/list/delete
pub trait ObjectStorage: Send + Sync {
    /// Open an object for reading
    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError>;

    /// Store everything `reader` yields from its current position under `path`
    fn put(&self, path: &str, reader: &mut dyn Read) -> Result<StoredObject, StorageError>;

    /// Remove an object or everything under a prefix. Absent paths are not an error.
    fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// All objects under a prefix
    fn list(&self, path: &str) -> Result<Vec<StoredObject>, StorageError>;
}
