//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a file atomically: write to a temp file in the same directory,
/// then rename into place. A crash mid-write never leaves a half-serialised
/// file visible.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    ensure_dir(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    io::Write::write_all(&mut tmp, contents)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to persist file: {}", path.display()))?;
    Ok(())
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Create a symlink (platform-aware).
#[cfg(unix)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Read a symlink target without following it. Returns None when the path
/// is absent or not a symlink.
pub fn read_link_if_symlink(path: &Path) -> Option<PathBuf> {
    let meta = fs::symlink_metadata(path).ok()?;
    if meta.file_type().is_symlink() {
        fs::read_link(path).ok()
    } else {
        None
    }
}

/// Whether anything (file, dir, or dangling symlink) occupies the path.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("file.json");

        write_atomic(&path, b"{}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");

        write_atomic(&path, b"{\"a\":1}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
    }

    #[test]
    fn test_relative_path() {
        let rel = relative_path(
            Path::new("/project/.claude/skills"),
            Path::new("/project/.pspm/skills/alice/a"),
        );
        assert_eq!(rel, PathBuf::from("../../.pspm/skills/alice/a"));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_link_if_symlink() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        fs::create_dir(&target).unwrap();

        let link = tmp.path().join("link");
        symlink(Path::new("target"), &link).unwrap();
        assert_eq!(read_link_if_symlink(&link), Some(PathBuf::from("target")));

        let file = tmp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert_eq!(read_link_if_symlink(&file), None);
        assert_eq!(read_link_if_symlink(&tmp.path().join("absent")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_exists_sees_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        symlink(Path::new("nowhere"), &link).unwrap();
        assert!(entry_exists(&link));
        assert!(!link.exists()); // Path::exists follows the link
    }
}
