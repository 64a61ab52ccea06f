//! Project context: the on-disk layout of a pspm project.
//!
//! Everything pspm touches lives under the project root:
//!
//! ```text
//! <project>/
//!   pspm.json
//!   pspm-lock.json
//!   .pspm/skills/...       # extracted payloads and local symlinks
//!   .pspm/cache/...        # content-addressed tarballs
//!   <agentSkillsDir>/...   # per-agent symlinks
//! ```

use std::path::{Path, PathBuf};

/// Paths for one project.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    root: PathBuf,
}

impl ProjectContext {
    /// Create a context rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectContext { root: root.into() }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `pspm.json`.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("pspm.json")
    }

    /// `pspm-lock.json`.
    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join("pspm-lock.json")
    }

    /// Legacy v1 lockfile name, still accepted on read.
    pub fn legacy_lockfile_path(&self) -> PathBuf {
        self.root.join("skill-lock.json")
    }

    /// The `.pspm` directory.
    pub fn pspm_dir(&self) -> PathBuf {
        self.root.join(".pspm")
    }

    /// The skill store root (`.pspm/skills`).
    pub fn skills_dir(&self) -> PathBuf {
        self.pspm_dir().join("skills")
    }

    /// The tarball cache (`.pspm/cache`).
    pub fn cache_dir(&self) -> PathBuf {
        self.pspm_dir().join("cache")
    }

    /// Store path for a registry skill: `.pspm/skills/<username>/<name>`.
    pub fn registry_store_path(&self, username: &str, name: &str) -> PathBuf {
        self.skills_dir().join(username).join(name)
    }

    /// Store path for a GitHub skill:
    /// `.pspm/skills/_github/<owner>/<repo>[/<path>]`.
    pub fn github_store_path(&self, owner: &str, repo: &str, subpath: Option<&str>) -> PathBuf {
        let mut path = self.skills_dir().join("_github").join(owner).join(repo);
        if let Some(sub) = subpath {
            path = path.join(sub);
        }
        path
    }

    /// Store path for a local skill symlink: `.pspm/skills/_local/<name>`.
    pub fn local_store_path(&self, name: &str) -> PathBuf {
        self.skills_dir().join("_local").join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_paths() {
        let ctx = ProjectContext::new("/proj");
        assert_eq!(
            ctx.registry_store_path("alice", "a"),
            PathBuf::from("/proj/.pspm/skills/alice/a")
        );
        assert_eq!(
            ctx.github_store_path("acme", "prompts", Some("skills/review")),
            PathBuf::from("/proj/.pspm/skills/_github/acme/prompts/skills/review")
        );
        assert_eq!(
            ctx.github_store_path("acme", "prompts", None),
            PathBuf::from("/proj/.pspm/skills/_github/acme/prompts")
        );
        assert_eq!(
            ctx.local_store_path("my-skill"),
            PathBuf::from("/proj/.pspm/skills/_local/my-skill")
        );
    }

    #[test]
    fn test_file_paths() {
        let ctx = ProjectContext::new("/proj");
        assert_eq!(ctx.manifest_path(), PathBuf::from("/proj/pspm.json"));
        assert_eq!(ctx.lockfile_path(), PathBuf::from("/proj/pspm-lock.json"));
        assert_eq!(
            ctx.legacy_lockfile_path(),
            PathBuf::from("/proj/skill-lock.json")
        );
        assert_eq!(ctx.cache_dir(), PathBuf::from("/proj/.pspm/cache"));
    }
}
