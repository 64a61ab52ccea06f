//! Content-addressed tarball cache.
//!
//! Per-project directory of verified tarballs named `sha256-<hex>.tgz`.
//! Entries are only written after integrity verification, so a hit is
//! normally trustworthy; reads still re-verify and delete on mismatch,
//! which makes cache corruption self-healing rather than fatal.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs;
use crate::util::integrity::Integrity;

/// The `.pspm/cache` store.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Create a cache rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ContentCache { dir: dir.into() }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a given integrity would be stored at.
    pub fn entry_path(&self, integrity: &Integrity) -> PathBuf {
        self.dir.join(integrity.cache_filename())
    }

    /// Look up verified bytes. A read failure is a miss; a verification
    /// failure deletes the entry and is also a miss.
    pub fn read(&self, integrity: &Integrity) -> Option<Vec<u8>> {
        let path = self.entry_path(integrity);
        let bytes = std::fs::read(&path).ok()?;

        if integrity.verify(&bytes).is_err() {
            tracing::warn!(
                "cache entry {} failed verification, removing",
                path.display()
            );
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(bytes)
    }

    /// Store verified bytes. Callers must have checked integrity already;
    /// this re-derives the filename from the same value so lockfile and
    /// cache can never disagree.
    pub fn write(&self, integrity: &Integrity, bytes: &[u8]) -> Result<()> {
        debug_assert!(integrity.verify(bytes).is_ok());
        fs::write_atomic(&self.entry_path(integrity), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_miss_then_hit() {
        let tmp = TempDir::new().unwrap();
        let cache = ContentCache::new(tmp.path().join("cache"));
        let integrity = Integrity::from_bytes(b"payload");

        assert!(cache.read(&integrity).is_none());

        cache.write(&integrity, b"payload").unwrap();
        assert_eq!(cache.read(&integrity).unwrap(), b"payload");
    }

    #[test]
    fn test_corrupt_entry_removed_on_read() {
        let tmp = TempDir::new().unwrap();
        let cache = ContentCache::new(tmp.path().join("cache"));
        let integrity = Integrity::from_bytes(b"payload");

        // plant corrupted bytes under the right name
        std::fs::create_dir_all(cache.dir()).unwrap();
        std::fs::write(cache.entry_path(&integrity), b"tampered").unwrap();

        assert!(cache.read(&integrity).is_none());
        assert!(!cache.entry_path(&integrity).exists());
    }

    #[test]
    fn test_filename_is_hex_derived() {
        let cache = ContentCache::new("/proj/.pspm/cache");
        let integrity = Integrity::from_bytes(b"");
        let path = cache.entry_path(&integrity);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "sha256-e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.tgz"
        );
    }
}
