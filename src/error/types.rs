//! Error types
//!
//! Defines the storage error taxonomy and the top-level error used by the binary.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    /// Path absent where it must exist.
    NotFound(PathBuf),
    /// An ancestor exists but is not a directory.
    NotADirectory(PathBuf),
    /// A file is required but a directory exists at the path.
    NotAFile(PathBuf),
    IoError(io::Error),
    InvalidBase(String),
    PathTraversal(String),
}

impl StorageError {
    /// Maps an io error raised while touching `path`, keeping `NotFound` distinct.
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
            io::ErrorKind::NotADirectory => StorageError::NotADirectory(path.to_path_buf()),
            _ => StorageError::IoError(error),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "Not found: {}", p.display()),
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            StorageError::NotAFile(p) => write!(f, "Not a file: {}", p.display()),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
            StorageError::InvalidBase(b) => write!(f, "Invalid base directory: {}", b),
            StorageError::PathTraversal(p) => write!(f, "Path traversal attempt: {}", p),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// Top-level error for the `rax-store` binary
#[derive(Debug)]
pub enum StoreError {
    Config(config::ConfigError),
    Storage(StorageError),
    Io(io::Error),
    Usage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Config(e) => write!(f, "Configuration error: {}", e),
            StoreError::Storage(e) => write!(f, "Storage error: {}", e),
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
            StoreError::Usage(msg) => write!(f, "Usage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<config::ConfigError> for StoreError {
    fn from(error: config::ConfigError) -> Self {
        StoreError::Config(error)
    }
}

impl From<StorageError> for StoreError {
    fn from(error: StorageError) -> Self {
        StoreError::Storage(error)
    }
}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> Self {
        StoreError::Io(error)
    }
}
