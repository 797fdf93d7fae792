pub mod commands;
pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

pub use config::StorageConfig;
pub use error::{StorageError, StoreError};
pub use storage::{LocalStorage, ObjectStorage, PathResolver, StoredObject};
