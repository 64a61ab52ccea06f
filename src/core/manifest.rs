//! pspm.json manifest parsing and mutation.
//!
//! The manifest declares a project's skill dependencies in three maps, one
//! per source kind, plus per-agent overrides. Publishing-only fields
//! (`name`, `version`, `files`, ...) are preserved verbatim but never
//! interpreted here.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs;

/// Per-agent override in the `agents` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory that receives this agent's skill symlinks.
    #[serde(rename = "skillsDir")]
    pub skills_dir: String,
}

/// The parsed pspm.json manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Registry dependencies: `@user/<username>/<name>` -> range string.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// GitHub dependencies: `github:<owner>/<repo>[/<path>]` -> ref string.
    #[serde(
        rename = "githubDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub github_dependencies: BTreeMap<String, String>,

    /// Local dependencies: `file:<path>` -> version marker (`*`).
    #[serde(
        rename = "localDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub local_dependencies: BTreeMap<String, String>,

    /// Agent overrides and custom agents.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, AgentConfig>,

    /// Publishing metadata and any other keys, preserved on write.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Load the manifest, returning an empty one if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Save the manifest: two-space JSON with a trailing newline. Creates
    /// the file lazily on first write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)
            .context("failed to serialise manifest")?;
        content.push('\n');
        fs::write_atomic(path, content.as_bytes())
    }

    /// Whether any dependency map has entries.
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
            || !self.github_dependencies.is_empty()
            || !self.local_dependencies.is_empty()
    }

    /// Record a registry dependency.
    pub fn add_dependency(&mut self, key: impl Into<String>, range: impl Into<String>) {
        self.dependencies.insert(key.into(), range.into());
    }

    /// Record a GitHub dependency. The stored value is the requested ref
    /// (empty string when the default branch was asked for).
    pub fn add_github_dependency(&mut self, key: impl Into<String>, reference: impl Into<String>) {
        self.github_dependencies.insert(key.into(), reference.into());
    }

    /// Record a local dependency with the conventional `*` marker.
    pub fn add_local_dependency(&mut self, key: impl Into<String>) {
        self.local_dependencies.insert(key.into(), "*".into());
    }

    /// Remove a dependency from whichever map holds it. Returns false when
    /// the key is in none of them.
    pub fn remove_dependency(&mut self, key: &str) -> bool {
        self.dependencies.remove(key).is_some()
            || self.github_dependencies.remove(key).is_some()
            || self.local_dependencies.remove(key).is_some()
    }
}
