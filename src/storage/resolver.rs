//! Key resolution
//!
//! Maps object keys onto absolute paths under the storage base directory.
//! Resolution is lexical: nothing here touches the disk.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Resolves object keys against a fixed base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    /// Builds a resolver, making `base` absolute and normalized.
    ///
    /// Fails with [`StorageError::InvalidBase`] when `base` is empty or the
    /// current directory cannot be determined.
    pub fn new(base: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base = base.as_ref();
        let absolute = std::path::absolute(base)
            .map_err(|e| StorageError::InvalidBase(format!("{}: {}", base.display(), e)))?;

        Ok(Self {
            base: normalize(&absolute),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolves a key to an absolute path.
    ///
    /// Inputs already under the base are only normalized. Anything else,
    /// including absolute paths, is joined onto the base. `..` segments are
    /// honoured, so the result may land outside the base; use
    /// [`PathResolver::resolve_contained`] when that must be refused.
    pub fn resolve(&self, key: impl AsRef<Path>) -> PathBuf {
        let key = key.as_ref();
        if key.starts_with(&self.base) {
            return normalize(key);
        }

        let relative: PathBuf = key
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        normalize(&self.base.join(relative))
    }

    /// Resolves a key, refusing results that escape the base.
    pub fn resolve_contained(&self, key: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        let resolved = self.resolve(key.as_ref());
        if !resolved.starts_with(&self.base) {
            return Err(StorageError::PathTraversal(
                key.as_ref().to_string_lossy().to_string(),
            ));
        }
        Ok(resolved)
    }

    /// Inverse of [`PathResolver::resolve`].
    ///
    /// Returns a `/`-separated key relative to the base. Paths outside the
    /// base get leading `..` segments, so `resolve(key_for(p)) == p` for any
    /// normalized absolute `p`. Paths sharing no root with the base are
    /// returned whole.
    pub fn key_for(&self, path: &Path) -> String {
        let path = normalize(path);
        let base: Vec<Component> = self.base.components().collect();
        let target: Vec<Component> = path.components().collect();

        let common = base
            .iter()
            .zip(&target)
            .take_while(|(b, t)| b == t)
            .count();
        if common == 0 {
            return path.to_string_lossy().to_string();
        }

        std::iter::repeat_n(Cow::Borrowed(".."), base.len() - common)
            .chain(target[common..].iter().map(|c| c.as_os_str().to_string_lossy()))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Lexically removes `.` and `..` segments.
///
/// `..` never climbs above the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new("/tmp/store").unwrap()
    }

    #[test]
    fn test_relative_key_joins_base() {
        assert_eq!(
            resolver().resolve("a/b.txt"),
            PathBuf::from("/tmp/store/a/b.txt")
        );
    }

    #[test]
    fn test_absolute_key_under_base_unchanged() {
        assert_eq!(
            resolver().resolve("/tmp/store/a/./b.txt"),
            PathBuf::from("/tmp/store/a/b.txt")
        );
    }

    #[test]
    fn test_absolute_key_outside_base_is_rerooted() {
        assert_eq!(
            resolver().resolve("/a/b.txt"),
            PathBuf::from("/tmp/store/a/b.txt")
        );
    }

    #[test]
    fn test_sibling_prefix_is_not_under_base() {
        assert_eq!(
            resolver().resolve("/tmp/store2/x"),
            PathBuf::from("/tmp/store/tmp/store2/x")
        );
    }

    #[test]
    fn test_dot_segments_normalized() {
        assert_eq!(
            resolver().resolve("a/./c/../b.txt"),
            PathBuf::from("/tmp/store/a/b.txt")
        );
    }

    #[test]
    fn test_traversal_escapes_base_permissively() {
        assert_eq!(
            resolver().resolve("../outside.txt"),
            PathBuf::from("/tmp/outside.txt")
        );
    }

    #[test]
    fn test_resolve_contained_rejects_traversal() {
        let result = resolver().resolve_contained("a/../../outside.txt");
        assert!(matches!(result, Err(StorageError::PathTraversal(_))));
        assert!(resolver().resolve_contained("a/../b.txt").is_ok());
    }

    #[test]
    fn test_key_for_round_trips() {
        let r = resolver();
        let abs = r.resolve("a/b/c.txt");
        assert_eq!(r.key_for(&abs), "a/b/c.txt");
        assert_eq!(r.resolve(r.key_for(&abs)), abs);
    }

    #[test]
    fn test_key_for_outside_base_round_trips() {
        let r = resolver();
        let outside = r.resolve("../other/f.txt");
        assert_eq!(outside, PathBuf::from("/tmp/other/f.txt"));
        assert_eq!(r.key_for(&outside), "../other/f.txt");
        assert_eq!(r.resolve(r.key_for(&outside)), outside);

        let far = PathBuf::from("/var/data/x.bin");
        assert_eq!(r.key_for(&far), "../../var/data/x.bin");
        assert_eq!(r.resolve(r.key_for(&far)), far);

        let sibling = PathBuf::from("/tmp/store2/y");
        assert_eq!(r.key_for(&sibling), "../store2/y");
        assert_eq!(r.resolve(r.key_for(&sibling)), sibling);
    }

    #[test]
    fn test_key_for_base_itself_is_empty() {
        let r = resolver();
        assert_eq!(r.key_for(r.base()), "");
        assert_eq!(r.resolve(r.key_for(r.base())), r.base());
    }

    #[test]
    fn test_relative_base_becomes_absolute() {
        let r = PathResolver::new("./some/../store").unwrap();
        assert!(r.base().is_absolute());
        assert!(r.base().ends_with("store"));
    }

    #[test]
    fn test_empty_base_is_rejected() {
        assert!(matches!(
            PathResolver::new(""),
            Err(StorageError::InvalidBase(_))
        ));
    }

    #[test]
    fn test_normalize_stops_at_root() {
        assert_eq!(normalize(Path::new("/../../a")), PathBuf::from("/a"));
    }
}
