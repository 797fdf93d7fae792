//! Storage operations
//!
//! The local disk object store: keys map 1:1 onto regular files under a base
//! directory and directories exist only to hold them.
//!
//! Calls are blocking and uncoordinated. Concurrent writers to the same key
//! race at the filesystem level and the last `put` wins.

use log::{debug, error, info};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::storage::filesystem::{self, BUFFER_SIZE};
use crate::storage::interface::ObjectStorage;
use crate::storage::resolver::PathResolver;
use crate::storage::results::StoredObject;

/// Object store backed by a local directory tree
#[derive(Debug)]
pub struct LocalStorage {
    resolver: PathResolver,
    buffer_size: usize,
    strict_paths: bool,
    this: Weak<LocalStorage>,
}

impl LocalStorage {
    /// Store rooted at `base` with default settings. Nothing is created on disk.
    pub fn new(base: impl AsRef<Path>) -> Result<Arc<Self>, StorageError> {
        let resolver = PathResolver::new(base)?;
        Ok(Self::build(resolver, BUFFER_SIZE, false))
    }

    /// Store built from configuration, creating the base directory if asked to
    pub fn from_config(config: &StorageConfig) -> Result<Arc<Self>, StorageError> {
        let resolver = PathResolver::new(config.base_path())?;

        if config.create_base {
            filesystem::ensure_dir(resolver.base())?;
        }
        info!(
            "Object store rooted at {} (strict paths: {})",
            resolver.base().display(),
            config.strict_paths
        );

        Ok(Self::build(resolver, config.buffer_size, config.strict_paths))
    }

    fn build(resolver: PathResolver, buffer_size: usize, strict_paths: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            resolver,
            buffer_size,
            strict_paths,
            this: this.clone(),
        })
    }

    pub fn base(&self) -> &Path {
        self.resolver.base()
    }

    /// Absolute path for `key`
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if self.strict_paths {
            self.resolver.resolve_contained(key)
        } else {
            Ok(self.resolver.resolve(key))
        }
    }

    fn object_at(&self, path: &Path) -> StoredObject {
        let handle: Weak<dyn ObjectStorage> = self.this.clone();
        StoredObject::new(self.resolver.key_for(path), handle)
    }

    /// Store the bytes of `reader` under `key`, replacing any existing object.
    ///
    /// Parent directories are created as needed. On error the destination may
    /// hold partial content.
    pub fn put<R: Read + ?Sized>(
        &self,
        key: &str,
        reader: &mut R,
    ) -> Result<StoredObject, StorageError> {
        let path = self.resolve(key)?;
        filesystem::ensure_file(&path)?;

        let mut writer = filesystem::write_stream(&path, self.buffer_size)?;
        let written = filesystem::copy_stream(reader, &mut writer, self.buffer_size)
            .map_err(|e| {
                error!("Failed to write object {} ({}): {}", key, path.display(), e);
                StorageError::from(e)
            })?;

        info!("Stored {} ({} bytes) at {}", key, written, path.display());
        Ok(self.object_at(&path).with_size(written))
    }

    /// Like [`LocalStorage::put`], but rewinds `reader` to the start first
    pub fn put_seekable<R: Read + Seek>(
        &self,
        key: &str,
        reader: &mut R,
    ) -> Result<StoredObject, StorageError> {
        reader.rewind()?;
        self.put(key, reader)
    }

    /// Open an object for reading
    pub fn get(&self, key: &str) -> Result<File, StorageError> {
        let path = self.resolve(key)?;
        let file = File::open(&path).map_err(|e| StorageError::from_io(&path, e))?;
        if file.metadata()?.is_dir() {
            return Err(StorageError::NotAFile(path));
        }
        debug!("Opened {} ({})", key, path.display());
        Ok(file)
    }

    /// Open an object as a buffered stream. The stream owns its file handle.
    pub fn get_stream(&self, key: &str) -> Result<BufReader<File>, StorageError> {
        let file = self.get(key)?;
        Ok(BufReader::with_capacity(self.buffer_size, file))
    }

    /// Remove the object or subtree at `key`. Absent keys are not an error.
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        filesystem::remove(&path)?;
        info!("Deleted {} ({})", key, path.display());
        Ok(())
    }

    /// Every object below `prefix`, with modification times.
    ///
    /// Lossy: entries that cannot be read are skipped rather than failing the
    /// listing. A prefix naming a single file yields nothing.
    pub fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let root = self.resolve(prefix)?;

        let objects: Vec<StoredObject> = filesystem::walk_files(&root)
            .into_iter()
            .map(|(path, metadata)| {
                self.object_at(&path)
                    .with_last_modified(metadata.modified().ok())
                    .with_size(metadata.len())
            })
            .collect();

        debug!("Listed {} objects under {}", objects.len(), root.display());
        Ok(objects)
    }

    /// Object metadata for a single key
    pub fn stat(&self, key: &str) -> Result<StoredObject, StorageError> {
        let path = self.resolve(key)?;
        let metadata = filesystem::stat(&path)?;
        if metadata.is_dir() {
            return Err(StorageError::NotAFile(path));
        }
        Ok(self
            .object_at(&path)
            .with_last_modified(metadata.modified().ok())
            .with_size(metadata.len()))
    }

    /// Copy an object or subtree to another key.
    ///
    /// Copying an object onto itself leaves it untouched; copying a prefix
    /// into itself is refused.
    pub fn copy_object(&self, from: &str, to: &str) -> Result<StoredObject, StorageError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        filesystem::copy_path_buffered(&src, &dst, self.buffer_size)?;
        info!("Copied {} -> {}", from, to);
        Ok(self.object_at(&dst))
    }

    /// Move an object or subtree to another key.
    ///
    /// Moving onto the same key is a no-op; moving a prefix below itself is
    /// refused.
    pub fn move_object(&self, from: &str, to: &str) -> Result<StoredObject, StorageError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        filesystem::move_path_buffered(&src, &dst, self.buffer_size)?;
        info!("Moved {} -> {}", from, to);
        Ok(self.object_at(&dst))
    }
}

impl ObjectStorage for LocalStorage {
    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        Ok(Box::new(self.get_stream(path)?))
    }

    fn put(&self, path: &str, reader: &mut dyn Read) -> Result<StoredObject, StorageError> {
        LocalStorage::put(self, path, reader)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        LocalStorage::delete(self, path)
    }

    fn list(&self, path: &str) -> Result<Vec<StoredObject>, StorageError> {
        LocalStorage::list(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn store() -> (TempDir, Arc<LocalStorage>) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    fn read_object(storage: &LocalStorage, key: &str) -> String {
        let mut out = String::new();
        storage.get(key).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn keys(objects: &[StoredObject]) -> Vec<&str> {
        objects.iter().map(|o| o.path.as_str()).collect()
    }

    #[test]
    fn test_put_then_get() {
        let (_dir, storage) = store();
        let object = storage.put("a/b.txt", &mut "hello".as_bytes()).unwrap();

        assert_eq!(object.path, "a/b.txt");
        assert_eq!(object.name, "b.txt");
        assert_eq!(object.size, Some(5));
        assert_eq!(read_object(&storage, "a/b.txt"), "hello");
    }

    #[test]
    fn test_put_overwrites_longer_content() {
        let (_dir, storage) = store();
        storage.put("k", &mut "a much longer value".as_bytes()).unwrap();
        storage.put("k", &mut "short".as_bytes()).unwrap();
        assert_eq!(read_object(&storage, "k"), "short");
    }

    #[test]
    fn test_put_binary_round_trip() {
        let (_dir, storage) = store();
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        storage.put("bin/blob", &mut data.as_slice()).unwrap();

        let mut out = Vec::new();
        storage.get("bin/blob").unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_put_seekable_rewinds() {
        let (_dir, storage) = store();
        let mut cursor = Cursor::new(b"rewound".to_vec());
        let mut sink = Vec::new();
        cursor.read_to_end(&mut sink).unwrap();

        storage.put_seekable("r.txt", &mut cursor).unwrap();
        assert_eq!(read_object(&storage, "r.txt"), "rewound");
    }

    #[test]
    fn test_put_onto_directory_fails() {
        let (_dir, storage) = store();
        storage.put("d/inner", &mut "x".as_bytes()).unwrap();
        assert!(matches!(
            storage.put("d", &mut "y".as_bytes()),
            Err(StorageError::NotAFile(_))
        ));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, storage) = store();
        assert!(storage.get("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_directory_is_not_an_object() {
        let (_dir, storage) = store();
        storage.put("d/f", &mut "x".as_bytes()).unwrap();
        assert!(matches!(storage.get("d"), Err(StorageError::NotAFile(_))));
    }

    #[test]
    fn test_get_stream_outlives_call() {
        let (_dir, storage) = store();
        let payload = "z".repeat(3 * BUFFER_SIZE);
        storage.put("big.txt", &mut payload.as_bytes()).unwrap();

        let mut stream = storage.get_stream("big.txt").unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_delete_tree_and_missing() {
        let (dir, storage) = store();
        storage.put("a/b.txt", &mut "hello".as_bytes()).unwrap();

        storage.delete("a").unwrap();
        assert!(!dir.path().join("a").exists());
        storage.delete("a").unwrap();
        storage.delete("never/existed").unwrap();
    }

    #[test]
    fn test_list_depths() {
        let (_dir, storage) = store();
        storage.put("zero.txt", &mut "0".as_bytes()).unwrap();
        storage.put("one/one.txt", &mut "1".as_bytes()).unwrap();
        storage.put("one/two/two.txt", &mut "2".as_bytes()).unwrap();

        let objects = storage.list("").unwrap();
        let mut listed = keys(&objects);
        listed.sort();
        assert_eq!(listed, vec!["one/one.txt", "one/two/two.txt", "zero.txt"]);
        assert!(objects.iter().all(|o| o.last_modified.is_some()));

        for object in &objects {
            let resolved = storage.resolve(&object.path).unwrap();
            assert!(resolved.is_file());
            assert!(resolved.starts_with(storage.base()));
        }
    }

    #[test]
    fn test_list_prefix_and_missing_prefix() {
        let (_dir, storage) = store();
        storage.put("a/b.txt", &mut "hello".as_bytes()).unwrap();
        storage.put("c.txt", &mut "other".as_bytes()).unwrap();

        assert_eq!(keys(&storage.list("a").unwrap()), vec!["a/b.txt"]);
        assert!(storage.list("nothing/here").unwrap().is_empty());
        assert!(storage.list("c.txt").unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_empty_directories() {
        let (dir, storage) = store();
        fs::create_dir_all(dir.path().join("empty/nested")).unwrap();
        assert!(storage.list("").unwrap().is_empty());
    }

    #[test]
    fn test_absolute_key_under_base() {
        let (dir, storage) = store();
        let absolute = dir.path().join("abs.txt");
        storage
            .put(absolute.to_str().unwrap(), &mut "abs".as_bytes())
            .unwrap();
        assert_eq!(read_object(&storage, "abs.txt"), "abs");
    }

    #[test]
    fn test_strict_paths_refuse_traversal() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            strict_paths: true,
            ..StorageConfig::with_base(dir.path().join("root").to_string_lossy())
        };
        let storage = LocalStorage::from_config(&config).unwrap();
        assert!(storage.base().is_dir());

        let result = storage.put("../escape.txt", &mut "x".as_bytes());
        assert!(matches!(result, Err(StorageError::PathTraversal(_))));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_stat() {
        let (_dir, storage) = store();
        storage.put("s/t.txt", &mut "four".as_bytes()).unwrap();

        let object = storage.stat("s/t.txt").unwrap();
        assert_eq!(object.size, Some(4));
        assert!(object.last_modified.is_some());
        assert!(storage.stat("s/missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_copy_and_move_objects() {
        let (_dir, storage) = store();
        storage.put("src/a.txt", &mut "a".as_bytes()).unwrap();
        storage.put("src/deep/b.txt", &mut "b".as_bytes()).unwrap();

        storage.copy_object("src", "copy").unwrap();
        assert_eq!(read_object(&storage, "copy/a.txt"), "a");
        assert_eq!(read_object(&storage, "copy/deep/b.txt"), "b");

        let moved = storage.move_object("copy/a.txt", "moved/a.txt").unwrap();
        assert_eq!(moved.path, "moved/a.txt");
        assert!(storage.get("copy/a.txt").unwrap_err().is_not_found());
        assert_eq!(read_object(&storage, "moved/a.txt"), "a");
    }

    #[test]
    fn test_copy_object_onto_same_key() {
        let (_dir, storage) = store();
        storage.put("f.txt", &mut "precious".as_bytes()).unwrap();

        storage.copy_object("f.txt", "./f.txt").unwrap();
        assert_eq!(read_object(&storage, "f.txt"), "precious");
    }

    #[test]
    fn test_move_object_onto_itself_or_below_keeps_objects() {
        let (_dir, storage) = store();
        storage.put("d/a.txt", &mut "a".as_bytes()).unwrap();
        storage.put("d/x/b.txt", &mut "b".as_bytes()).unwrap();

        assert!(storage.move_object("d", "d/inner").is_err());
        let moved = storage.move_object("d", "d").unwrap();
        assert_eq!(moved.path, "d");

        let mut listed = keys(&storage.list("").unwrap())
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        listed.sort();
        assert_eq!(listed, vec!["d/a.txt", "d/x/b.txt"]);
        assert_eq!(read_object(&storage, "d/x/b.txt"), "b");
    }

    #[test]
    fn test_escaped_prefix_keys_resolve_back() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("store")).unwrap();
        fs::create_dir_all(dir.path().join("other")).unwrap();
        fs::write(dir.path().join("other/f.txt"), b"outside").unwrap();

        let listed = storage.list("../other").unwrap();
        assert_eq!(keys(&listed), vec!["../other/f.txt"]);
        assert_eq!(
            storage.resolve(&listed[0].path).unwrap(),
            dir.path().join("other/f.txt")
        );

        let mut out = String::new();
        listed[0]
            .open()
            .unwrap()
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "outside");

        let written = storage.put("../other/g.txt", &mut "g".as_bytes()).unwrap();
        assert_eq!(written.path, "../other/g.txt");
        assert_eq!(read_object(&storage, &written.path), "g");
    }

    #[cfg(unix)]
    #[test]
    fn test_list_skips_unreadable_entries() {
        use std::os::unix::fs::symlink;

        let (dir, storage) = store();
        storage.put("p/real.txt", &mut "r".as_bytes()).unwrap();
        symlink(dir.path().join("p/nowhere"), dir.path().join("p/dangling")).unwrap();

        let listed = storage.list("p").unwrap();
        assert_eq!(keys(&listed), vec!["p/real.txt"]);
    }

    #[test]
    fn test_objects_reopen_through_backref() {
        let (_dir, storage) = store();
        storage.put("x/y.txt", &mut "via handle".as_bytes()).unwrap();

        let objects = storage.list("x").unwrap();
        let mut out = String::new();
        objects[0]
            .open()
            .unwrap()
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "via handle");

        drop(storage);
        assert!(objects[0].open().is_none());
    }

    #[test]
    fn test_usable_as_trait_object() {
        let (_dir, storage) = store();
        let backend: Arc<dyn ObjectStorage> = storage;

        backend.put("t/o.txt", &mut "dyn".as_bytes()).unwrap();
        let mut out = String::new();
        backend.get("t/o.txt").unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "dyn");
        assert_eq!(backend.list("t").unwrap().len(), 1);
        backend.delete("t").unwrap();
        assert!(backend.list("t").unwrap().is_empty());
    }
}
