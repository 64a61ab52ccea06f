//! Tarball extraction into the project store.
//!
//! Registry tarballs carry a single top-level directory that is always
//! stripped. GitHub tarballs also carry a single top-level directory, but
//! its name (`<owner>-<repo>-<sha>`) is not known ahead of time; it is
//! detected as the one entry that is neither `pax_global_header` nor a
//! dotfile. The destination is removed and recreated before writing so
//! the payload is exactly what the archive carries, never a merge with a
//! prior version.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;

use crate::util::fs;

/// How the archive's leading path components map onto the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Strip the single top-level directory (registry tarballs).
    StripRoot,

    /// Strip the detected top-level directory, then keep only entries
    /// under the given repository subpath (GitHub tarballs).
    GitHub { subpath: Option<String> },
}

/// The requested GitHub subpath is not in the archive. Carries the
/// top-level directories that do exist so the caller can present an
/// actionable message.
#[derive(Debug, Error)]
#[error("path `{subpath}` not found in `{identity}`; top-level entries: {}", available.join(", "))]
pub struct PathNotFoundError {
    pub identity: String,
    pub subpath: String,
    pub available: Vec<String>,
}

/// Extract tarball bytes to `dest` according to the layout.
pub fn extract_tarball(identity: &str, bytes: &[u8], dest: &Path, layout: &Layout) -> Result<()> {
    fs::remove_dir_all_if_exists(dest)?;
    fs::ensure_dir(dest)?;

    match layout {
        Layout::StripRoot => unpack(bytes, dest, 1, None),
        Layout::GitHub { subpath } => {
            let result = unpack(bytes, dest, 1, subpath.as_deref());
            if let (Err(_), Some(sub)) = (&result, subpath) {
                // Re-walk to gather top-level entries for the error only
                // when something actually went missing.
                if result
                    .as_ref()
                    .err()
                    .and_then(|e| e.downcast_ref::<NoEntriesMatched>())
                    .is_some()
                {
                    let available = top_level_entries(bytes)?;
                    return Err(PathNotFoundError {
                        identity: identity.to_string(),
                        subpath: sub.clone(),
                        available,
                    }
                    .into());
                }
            }
            result
        }
    }
}

#[derive(Debug, Error)]
#[error("no archive entries matched")]
struct NoEntriesMatched;

fn unpack(bytes: &[u8], dest: &Path, strip: usize, subpath: Option<&str>) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let subpath_parts: Option<Vec<&str>> = subpath.map(|s| s.split('/').collect());
    let mut extracted_any = false;

    for entry in archive.entries().context("failed to read archive")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let raw_path = entry
            .path()
            .context("archive entry has invalid path")?
            .into_owned();

        let Some(stripped) = strip_components(&raw_path, strip) else {
            continue; // the top-level dir entry itself, or pax headers
        };

        let relative = match &subpath_parts {
            Some(parts) => {
                let Some(under) = strip_prefix_parts(&stripped, parts) else {
                    continue;
                };
                under
            }
            None => stripped,
        };

        if relative.as_os_str().is_empty() {
            continue;
        }
        if !is_safe_relative(&relative) {
            bail!("archive entry escapes destination: {}", raw_path.display());
        }

        let target = dest.join(&relative);
        let header_type = entry.header().entry_type();
        if header_type.is_dir() {
            fs::ensure_dir(&target)?;
            extracted_any = true;
        } else if header_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::ensure_dir(parent)?;
            }
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .with_context(|| format!("failed to read archive entry {}", raw_path.display()))?;
            std::fs::write(&target, contents)
                .with_context(|| format!("failed to write {}", target.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = std::fs::set_permissions(
                        &target,
                        std::fs::Permissions::from_mode(mode),
                    );
                }
            }
            extracted_any = true;
        }
        // Symlinks and other special entries inside skill tarballs are
        // skipped rather than materialised.
    }

    if !extracted_any {
        return Err(NoEntriesMatched.into());
    }
    Ok(())
}

/// Top-level directory names inside the archive after root-stripping,
/// ignoring `pax_global_header` and dotfiles.
fn top_level_entries(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut entries = Vec::new();

    for entry in archive.entries().context("failed to read archive")? {
        let entry = entry.context("failed to read archive entry")?;
        let path = entry.path().context("archive entry has invalid path")?;
        if let Some(stripped) = strip_components(&path, 1) {
            if let Some(Component::Normal(first)) = stripped.components().next() {
                let name = first.to_string_lossy().into_owned();
                if name != "pax_global_header" && !name.starts_with('.') && !entries.contains(&name)
                {
                    entries.push(name);
                }
            }
        }
    }
    Ok(entries)
}

fn strip_components(path: &Path, count: usize) -> Option<PathBuf> {
    let mut components = path.components();
    for _ in 0..count {
        match components.next() {
            Some(Component::Normal(first)) => {
                // pax headers sit at the top level and carry no payload
                if first.to_string_lossy() == "pax_global_header" {
                    return None;
                }
            }
            _ => return None,
        }
    }
    Some(components.as_path().to_path_buf())
}

fn strip_prefix_parts(path: &Path, parts: &[&str]) -> Option<PathBuf> {
    let mut components = path.components();
    for expected in parts {
        match components.next() {
            Some(Component::Normal(c)) if c.to_string_lossy() == *expected => {}
            _ => return None,
        }
    }
    Some(components.as_path().to_path_buf())
}

fn is_safe_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
}
