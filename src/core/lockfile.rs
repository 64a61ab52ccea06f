//! pspm-lock.json reading, writing, and format migrations.
//!
//! The lockfile is format-versioned; the current version is 5. Readers
//! accept any version at or below the current one and normalise to the
//! in-memory shape; writers emit the minimum version that carries every
//! populated section:
//!
//! - v1: legacy `skill-lock.json` with a top-level `skills` map
//! - v2: `pspm-lock.json` with `packages`
//! - v3: adds `githubPackages`
//! - v4: adds per-entry `dependencies`
//! - v5: adds `localPackages`
//!
//! Writes go through a temp-file-plus-rename so a crash mid-write cannot
//! leave a half-serialised file visible. Concurrent writers are not
//! coordinated; callers serialise.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs;

/// Current lockfile format version.
pub const LOCKFILE_VERSION: u32 = 5;

/// A locked registry skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Exact resolved version.
    pub version: String,

    /// Download URL actually used.
    pub resolved: String,

    /// `sha256-<base64>` of the tarball bytes.
    pub integrity: String,

    /// Deprecation message carried from the registry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,

    /// Transitive dependency identity -> resolved range (v4+). Lets an
    /// install order be rebuilt without another network round-trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
}

/// A locked GitHub skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubEntry {
    /// 7-char commit prefix.
    pub version: String,

    /// URL the tarball was fetched from.
    pub resolved: String,

    /// `sha256-<base64>` of the tarball bytes.
    pub integrity: String,

    /// Full commit SHA.
    #[serde(rename = "gitCommit")]
    pub git_commit: String,

    /// The ref the user asked for (branch, tag, or commit-ish).
    #[serde(rename = "gitRef")]
    pub git_ref: String,
}

/// A locked local skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEntry {
    /// Always the literal `"local"`.
    pub version: String,

    /// Path exactly as the user wrote it.
    pub path: String,

    /// Absolute path at lock time.
    #[serde(rename = "resolvedPath")]
    pub resolved_path: String,

    /// Skill name (from the skill's pspm.json, or the directory name).
    pub name: String,
}

/// The in-memory lockfile, always at the current shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    /// Registry the packages section was resolved against.
    pub registry_url: String,

    /// Registry skills, including the transitive closure of direct deps.
    pub packages: BTreeMap<String, RegistryEntry>,

    /// GitHub skills (always leaves).
    pub github_packages: BTreeMap<String, GitHubEntry>,

    /// Local skills (always leaves).
    pub local_packages: BTreeMap<String, LocalEntry>,
}

/// Serialised shape covering every version we read.
#[derive(Debug, Serialize, Deserialize)]
struct RawLockfile {
    /// Defaults to 1 on read: the oldest lockfiles predate the field.
    #[serde(rename = "lockfileVersion", default = "default_lockfile_version")]
    lockfile_version: u32,

    #[serde(rename = "registryUrl", default, skip_serializing_if = "String::is_empty")]
    registry_url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    packages: BTreeMap<String, RegistryEntry>,

    #[serde(
        rename = "githubPackages",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    github_packages: BTreeMap<String, GitHubEntry>,

    #[serde(
        rename = "localPackages",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    local_packages: BTreeMap<String, LocalEntry>,

    /// v1 legacy section (`skill-lock.json`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    skills: BTreeMap<String, RegistryEntry>,
}

fn default_lockfile_version() -> u32 {
    1
}

impl Lockfile {
    /// Create an empty lockfile bound to a registry.
    pub fn new(registry_url: impl Into<String>) -> Self {
        Lockfile {
            registry_url: registry_url.into(),
            ..Default::default()
        }
    }

    /// Load the lockfile for a project, accepting the legacy filename.
    ///
    /// Returns `Ok(None)` when neither file exists. Legacy content is
    /// upgraded in memory; the file itself is renamed by the next save.
    pub fn load(lockfile_path: &Path, legacy_path: &Path) -> Result<Option<Self>> {
        let (path, legacy) = if lockfile_path.exists() {
            (lockfile_path, false)
        } else if legacy_path.exists() {
            (legacy_path, true)
        } else {
            return Ok(None);
        };

        let content = fs::read_to_string(path)?;
        let raw: RawLockfile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse lockfile: {}", path.display()))?;

        if raw.lockfile_version > LOCKFILE_VERSION {
            bail!(
                "lockfile version {} is newer than this version of pspm supports ({})",
                raw.lockfile_version,
                LOCKFILE_VERSION
            );
        }

        if legacy || raw.lockfile_version == 1 {
            tracing::info!(
                "upgrading legacy lockfile {} to version {}",
                path.display(),
                LOCKFILE_VERSION
            );
        }

        Ok(Some(Self::upgrade(raw)))
    }

    /// Normalise any accepted version to the current in-memory shape.
    /// Applying this to already-current content changes nothing.
    fn upgrade(raw: RawLockfile) -> Self {
        let mut packages = raw.packages;
        // v1 kept entries under `skills`; fold them into `packages`.
        for (key, entry) in raw.skills {
            packages.entry(key).or_insert(entry);
        }

        Lockfile {
            registry_url: raw.registry_url,
            packages,
            github_packages: raw.github_packages,
            local_packages: raw.local_packages,
        }
    }

    /// The minimum format version that carries every populated feature.
    pub fn minimum_version(&self) -> u32 {
        if !self.local_packages.is_empty() {
            return 5;
        }
        if self
            .packages
            .values()
            .any(|e| e.dependencies.as_ref().is_some_and(|d| !d.is_empty()))
        {
            return 4;
        }
        if !self.github_packages.is_empty() {
            return 3;
        }
        2
    }

    /// Save atomically under the current filename; removes the legacy
    /// `skill-lock.json` once the new file is in place.
    pub fn save(&self, lockfile_path: &Path, legacy_path: &Path) -> Result<()> {
        let raw = RawLockfile {
            lockfile_version: self.minimum_version(),
            registry_url: self.registry_url.clone(),
            packages: self.packages.clone(),
            github_packages: self.github_packages.clone(),
            local_packages: self.local_packages.clone(),
            skills: BTreeMap::new(),
        };

        let mut content =
            serde_json::to_string_pretty(&raw).context("failed to serialise lockfile")?;
        content.push('\n');
        fs::write_atomic(lockfile_path, content.as_bytes())?;

        if legacy_path.exists() {
            std::fs::remove_file(legacy_path).with_context(|| {
                format!("failed to remove legacy lockfile: {}", legacy_path.display())
            })?;
        }
        Ok(())
    }

    /// Whether no section has entries.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.github_packages.is_empty()
            && self.local_packages.is_empty()
    }

    /// Remove an entry from whichever section holds it.
    pub fn remove(&mut self, key: &str) -> bool {
        self.packages.remove(key).is_some()
            || self.github_packages.remove(key).is_some()
            || self.local_packages.remove(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_entry(version: &str) -> RegistryEntry {
        RegistryEntry {
            version: version.to_string(),
            resolved: format!("https://dl.example/{version}.tgz"),
            integrity: "sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=".to_string(),
            deprecated: None,
            dependencies: None,
        }
    }

    #[test]
    fn test_missing_returns_none() {
        let tmp = TempDir::new().unwrap();
        let loaded = Lockfile::load(
            &tmp.path().join("pspm-lock.json"),
            &tmp.path().join("skill-lock.json"),
        )
        .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_minimum_version_ladder() {
        let mut lock = Lockfile::new("https://pspm.dev");
        assert_eq!(lock.minimum_version(), 2);

        lock.packages
            .insert("@user/alice/a".into(), registry_entry("1.0.0"));
        assert_eq!(lock.minimum_version(), 2);

        lock.github_packages.insert(
            "github:acme/prompts".into(),
            GitHubEntry {
                version: "abc1234".into(),
                resolved: "https://github.com/acme/prompts".into(),
                integrity: "sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=".into(),
                git_commit: "abc1234deadbeef".into(),
                git_ref: "main".into(),
            },
        );
        assert_eq!(lock.minimum_version(), 3);

        lock.packages.get_mut("@user/alice/a").unwrap().dependencies =
            Some([("@user/bob/b".to_string(), "^1".to_string())].into());
        assert_eq!(lock.minimum_version(), 4);

        lock.local_packages.insert(
            "file:../m".into(),
            LocalEntry {
                version: "local".into(),
                path: "../m".into(),
                resolved_path: "/abs/m".into(),
                name: "m".into(),
            },
        );
        assert_eq!(lock.minimum_version(), 5);
    }

    #[test]
    fn test_roundtrip_is_stable() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("pspm-lock.json");
        let legacy_path = tmp.path().join("skill-lock.json");

        let mut lock = Lockfile::new("https://pspm.dev");
        lock.packages
            .insert("@user/alice/a".into(), registry_entry("1.1.0"));
        lock.save(&lock_path, &legacy_path).unwrap();

        let first = std::fs::read_to_string(&lock_path).unwrap();
        let reloaded = Lockfile::load(&lock_path, &legacy_path).unwrap().unwrap();
        assert_eq!(reloaded, lock);

        reloaded.save(&lock_path, &legacy_path).unwrap();
        let second = std::fs::read_to_string(&lock_path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_v1_legacy_upgrade() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("pspm-lock.json");
        let legacy_path = tmp.path().join("skill-lock.json");

        std::fs::write(
            &legacy_path,
            r#"{
  "lockfileVersion": 1,
  "skills": {
    "@user/alice/a": {
      "version": "1.0.0",
      "resolved": "https://dl.example/a-1.0.0.tgz",
      "integrity": "sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
    }
  }
}"#,
        )
        .unwrap();

        let lock = Lockfile::load(&lock_path, &legacy_path).unwrap().unwrap();
        assert_eq!(lock.packages["@user/alice/a"].version, "1.0.0");

        // next write renames: new file appears, legacy file goes away
        lock.save(&lock_path, &legacy_path).unwrap();
        assert!(lock_path.exists());
        assert!(!legacy_path.exists());

        let reloaded = Lockfile::load(&lock_path, &legacy_path).unwrap().unwrap();
        assert_eq!(reloaded, lock);
    }

    #[test]
    fn test_v1_without_version_field() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("pspm-lock.json");
        let legacy_path = tmp.path().join("skill-lock.json");

        std::fs::write(
            &legacy_path,
            r#"{ "skills": { "@user/alice/a": {
  "version": "1.0.0",
  "resolved": "https://dl.example/a-1.0.0.tgz",
  "integrity": "sha256-47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
} } }"#,
        )
        .unwrap();

        let lock = Lockfile::load(&lock_path, &legacy_path).unwrap().unwrap();
        assert_eq!(lock.packages.len(), 1);
    }

    #[test]
    fn test_older_versions_accepted_newer_rejected() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("pspm-lock.json");
        let legacy_path = tmp.path().join("skill-lock.json");

        std::fs::write(
            &lock_path,
            r#"{ "lockfileVersion": 3, "registryUrl": "https://pspm.dev",
  "packages": {}, "githubPackages": {} }"#,
        )
        .unwrap();
        assert!(Lockfile::load(&lock_path, &legacy_path).unwrap().is_some());

        std::fs::write(&lock_path, r#"{ "lockfileVersion": 99 }"#).unwrap();
        assert!(Lockfile::load(&lock_path, &legacy_path).is_err());
    }

    #[test]
    fn test_written_version_is_minimum() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("pspm-lock.json");
        let legacy_path = tmp.path().join("skill-lock.json");

        let mut lock = Lockfile::new("https://pspm.dev");
        lock.packages
            .insert("@user/alice/a".into(), registry_entry("1.0.0"));
        lock.save(&lock_path, &legacy_path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&lock_path).unwrap()).unwrap();
        assert_eq!(raw["lockfileVersion"], 2);
        assert!(raw.get("githubPackages").is_none());
        assert!(raw.get("localPackages").is_none());
    }
}
