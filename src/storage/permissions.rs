//! File permissions
//!
//! Default modes for created entries plus chmod/lchown.

use std::fs;
use std::path::Path;

use crate::error::StorageError;

/// Mode for directories created by the store (before umask)
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Mode for files created by the store (before umask)
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Change the permission bits of a file or directory
#[cfg(unix)]
pub fn chmod(path: &Path, mode: u32) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| StorageError::from_io(path, e))
}

/// Change ownership without following a trailing symlink
#[cfg(unix)]
pub fn lchown(path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<(), StorageError> {
    std::os::unix::fs::lchown(path, uid, gid).map_err(|e| StorageError::from_io(path, e))
}

/// Permission bits of `path`
#[cfg(unix)]
pub fn mode_of(path: &Path) -> Result<u32, StorageError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| StorageError::from_io(path, e))?;
    Ok(metadata.permissions().mode() & 0o7777)
}

/// Copy permission bits from one entry to another
pub fn copy_permissions(from: &Path, to: &Path) -> Result<(), StorageError> {
    let permissions = fs::metadata(from)
        .map_err(|e| StorageError::from_io(from, e))?
        .permissions();
    fs::set_permissions(to, permissions).map_err(|e| StorageError::from_io(to, e))
}
