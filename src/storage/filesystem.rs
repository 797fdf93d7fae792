//! File system operations
//!
//! Primitives the object store is built on: directory and file bootstrap,
//! recursive copy/move/remove, whole-file helpers and the listing walk.
//!
//! None of the multi-step operations are transactional. A tree copy or move
//! that fails partway leaves whatever was already written at the destination,
//! and a failed move may leave the source partially emptied.

use log::{debug, info, warn};
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::permissions::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, copy_permissions};

/// Chunk size for streaming copies
pub const BUFFER_SIZE: usize = 8192; // 8KB

/// Check if a path exists. Only a definite "not found" counts as absent.
pub fn path_exists(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(_) => true,
        Err(e) => e.kind() != io::ErrorKind::NotFound,
    }
}

/// Create a single directory level with the default mode
pub fn mkdir(path: &Path) -> Result<(), StorageError> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DEFAULT_DIR_MODE);
    }
    builder.create(path).map_err(|e| StorageError::from_io(path, e))
}

/// Make sure `path` and all of its ancestors exist as directories.
///
/// Idempotent. Fails with [`StorageError::NotADirectory`] when the path or
/// one of its ancestors exists as something other than a directory.
pub fn ensure_dir(path: &Path) -> Result<(), StorageError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => return Err(StorageError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(StorageError::from_io(path, e)),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    match mkdir(path) {
        Ok(()) => {
            debug!("Created directory {}", path.display());
            Ok(())
        }
        // Lost a race with another creator; fine as long as it is a directory.
        Err(StorageError::IoError(e))
            if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() =>
        {
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Make sure an (possibly empty) file exists at `path`, creating parents.
///
/// An existing file is left untouched.
pub fn ensure_file(path: &Path) -> Result<(), StorageError> {
    ensure_parent(path)?;

    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Err(StorageError::NotAFile(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            match file_options().write(true).create_new(true).open(path) {
                Ok(_) => {
                    debug!("Created empty file {}", path.display());
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
                Err(e) => Err(StorageError::from_io(path, e)),
            }
        }
        Err(e) => Err(StorageError::from_io(path, e)),
    }
}

/// Names of the direct children of `dir`, sorted
pub fn read_dir_names(dir: &Path) -> Result<Vec<String>, StorageError> {
    let mut names = fs::read_dir(dir)
        .map_err(|e| StorageError::from_io(dir, e))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names)
}

/// Create a uniquely named directory under `dir` that outlives this call
pub fn temp_dir(dir: &Path, prefix: &str) -> Result<PathBuf, StorageError> {
    let created = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(dir)
        .map_err(|e| StorageError::from_io(dir, e))?;
    Ok(created.keep())
}

/// Write `data` to `path`, replacing existing content
pub fn write_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = create_file(path)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(())
}

/// Same as [`write_file`], creating missing parent directories first
pub fn output_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    ensure_parent(path)?;
    write_file(path, data)
}

/// Read a whole file into memory
pub fn read_file(path: &Path) -> Result<Vec<u8>, StorageError> {
    fs::read(path).map_err(|e| StorageError::from_io(path, e))
}

/// Append `data` to `path`, creating the file if absent
pub fn append_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = file_options()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| StorageError::from_io(path, e))?;
    file.write_all(data)?;
    Ok(())
}

/// Resize a file to `len` bytes
pub fn truncate(path: &Path, len: u64) -> Result<(), StorageError> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| StorageError::from_io(path, e))?;
    file.set_len(len)?;
    Ok(())
}

/// Buffered reader that owns the file handle
pub fn read_stream(path: &Path, buffer_size: usize) -> Result<BufReader<File>, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::from_io(path, e))?;
    Ok(BufReader::with_capacity(buffer_size, file))
}

/// Buffered writer over a freshly truncated file that owns the handle
pub fn write_stream(path: &Path, buffer_size: usize) -> Result<BufWriter<File>, StorageError> {
    Ok(BufWriter::with_capacity(buffer_size, create_file(path)?))
}

/// Stream everything from `reader` into `writer` in bounded chunks.
///
/// Returns the number of bytes transferred.
pub fn copy_stream<R, W>(reader: &mut R, writer: &mut W, buffer_size: usize) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }

    writer.flush()?;
    Ok(total)
}

/// Copy a file or a whole directory tree from `src` to `dst`.
///
/// Only content is copied; modes, owners and timestamps are not carried over.
/// Existing destination files are overwritten. Copying a file onto itself is
/// a no-op; copying a directory into its own subtree is refused.
pub fn copy_path(src: &Path, dst: &Path) -> Result<(), StorageError> {
    copy_path_buffered(src, dst, BUFFER_SIZE)
}

/// [`copy_path`] with an explicit chunk size for file content
pub fn copy_path_buffered(src: &Path, dst: &Path, buffer_size: usize) -> Result<(), StorageError> {
    let metadata = fs::metadata(src).map_err(|e| StorageError::from_io(src, e))?;

    if !metadata.is_dir() {
        if same_entry(src, dst) {
            debug!("Copy of {} onto itself skipped", src.display());
            return Ok(());
        }
        let bytes = copy_file(src, dst, buffer_size)?;
        debug!("Copied {} -> {} ({} bytes)", src.display(), dst.display(), bytes);
        return Ok(());
    }

    if dst.starts_with(src) || same_entry(src, dst) {
        return Err(nested_tree_error("copy", src, dst));
    }

    ensure_dir(dst)?;
    for entry in fs::read_dir(src).map_err(|e| StorageError::from_io(src, e))? {
        let name = entry?.file_name();
        copy_path_buffered(&src.join(&name), &dst.join(&name), buffer_size)?;
    }
    Ok(())
}

/// Move a file or a whole directory tree from `src` to `dst`.
///
/// Files are renamed, which keeps their mode. When the rename crosses a
/// filesystem boundary the file is copied, its permission bits reapplied and
/// the source removed. Directories are moved child by child and the emptied
/// source tree is removed at the end. Moving an entry onto itself is a no-op;
/// moving a directory into its own subtree is refused.
pub fn move_path(src: &Path, dst: &Path) -> Result<(), StorageError> {
    move_path_buffered(src, dst, BUFFER_SIZE)
}

/// [`move_path`] with an explicit chunk size for the cross-device fallback
pub fn move_path_buffered(src: &Path, dst: &Path, buffer_size: usize) -> Result<(), StorageError> {
    let metadata = fs::metadata(src).map_err(|e| StorageError::from_io(src, e))?;

    if src == dst || same_entry(src, dst) {
        debug!("Move of {} onto itself skipped", src.display());
        return Ok(());
    }

    if !metadata.is_dir() {
        return move_file(src, dst, buffer_size);
    }

    if dst.starts_with(src) {
        return Err(nested_tree_error("move", src, dst));
    }

    let children = fs::read_dir(src)
        .map_err(|e| StorageError::from_io(src, e))?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()?;

    ensure_dir(dst)?;
    for name in children {
        move_path_buffered(&src.join(&name), &dst.join(&name), buffer_size)?;
    }

    fs::remove_dir_all(src).map_err(|e| StorageError::from_io(src, e))?;
    debug!("Moved directory {} -> {}", src.display(), dst.display());
    Ok(())
}

/// Remove a file or a directory tree. Removing an absent path succeeds.
pub fn remove(path: &Path) -> Result<(), StorageError> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::from_io(path, e)),
    }
}

/// Rename a file or directory in place
pub fn rename(from: &Path, to: &Path) -> Result<(), StorageError> {
    fs::rename(from, to).map_err(|e| StorageError::from_io(from, e))
}

/// Metadata of `path`, following symlinks
pub fn stat(path: &Path) -> Result<Metadata, StorageError> {
    fs::metadata(path).map_err(|e| StorageError::from_io(path, e))
}

/// Metadata of `path` itself, not following a trailing symlink
pub fn lstat(path: &Path) -> Result<Metadata, StorageError> {
    fs::symlink_metadata(path).map_err(|e| StorageError::from_io(path, e))
}

/// Every regular file below `root`, excluding `root` itself.
///
/// Entries that cannot be read are skipped with a warning instead of failing
/// the walk, so the result may be incomplete. Children are visited in name
/// order. Symlinks are followed for files only: a symlink to a directory is
/// neither descended into nor reported, and a dangling symlink is skipped.
pub fn walk_files(root: &Path) -> Vec<(PathBuf, Metadata)> {
    let mut files = Vec::new();
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => walk_dir(root, &mut files),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Skipping unreadable {}: {}", root.display(), e),
    }
    files
}

fn walk_dir(dir: &Path, files: &mut Vec<(PathBuf, Metadata)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return;
        }
    };

    let mut entries: Vec<_> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if is_dir {
            walk_dir(&path, files);
            continue;
        }

        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => files.push((path, metadata)),
            Ok(_) => {}
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

fn file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(DEFAULT_FILE_MODE);
    }
    options
}

/// Open `path` for writing, creating or truncating it
fn create_file(path: &Path) -> Result<File, StorageError> {
    file_options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| StorageError::from_io(path, e))
}

/// True when both paths name the same existing filesystem entry
#[cfg(unix)]
fn same_entry(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(left), Ok(right)) => left.dev() == right.dev() && left.ino() == right.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_entry(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn nested_tree_error(action: &str, src: &Path, dst: &Path) -> StorageError {
    StorageError::IoError(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "cannot {} {} into itself ({})",
            action,
            src.display(),
            dst.display()
        ),
    ))
}

// Callers must rule out `src` and `dst` being the same file: `dst` is
// truncated before `src` is read.
fn copy_file(src: &Path, dst: &Path, buffer_size: usize) -> Result<u64, StorageError> {
    ensure_parent(dst)?;
    let mut reader = File::open(src).map_err(|e| StorageError::from_io(src, e))?;
    let mut writer = create_file(dst)?;
    Ok(copy_stream(&mut reader, &mut writer, buffer_size)?)
}

fn move_file(src: &Path, dst: &Path, buffer_size: usize) -> Result<(), StorageError> {
    ensure_parent(dst)?;
    match fs::rename(src, dst) {
        Ok(()) => {
            debug!("Renamed {} -> {}", src.display(), dst.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            info!(
                "Rename {} -> {} crosses devices, copying instead",
                src.display(),
                dst.display()
            );
            copy_file(src, dst, buffer_size)?;
            copy_permissions(src, dst)?;
            fs::remove_file(src).map_err(|e| StorageError::from_io(src, e))
        }
        Err(e) => Err(StorageError::from_io(src, e)),
    }
}
