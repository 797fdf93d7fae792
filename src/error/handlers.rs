//! Error handlers
//!
//! Logs errors and maps them to process exit codes for the binary.

use crate::error::types::{StorageError, StoreError};
use log::error;

/// Log a store error
pub fn handle_error(err: &StoreError) {
    error!("rax-store error: {}", err);
}

/// Convert error to a process exit code
pub fn error_to_exit_code(err: &StoreError) -> i32 {
    match err {
        StoreError::Usage(_) => 2,
        StoreError::Config(_) => 3,
        StoreError::Storage(StorageError::NotFound(_)) => 4,
        StoreError::Storage(_) => 5,
        StoreError::Io(_) => 5,
    }
}
