//! Local skill directories.
//!
//! Local skills are never copied or extracted; the store holds a symlink
//! to the directory the user named. Validation only requires a directory
//! carrying at least one of `SKILL.md` or `pspm.json`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::sources::FetchError;

/// A validated local skill.
#[derive(Debug, Clone)]
pub struct LocalSkill {
    /// Path exactly as the user wrote it.
    pub path: String,

    /// Absolute path after resolution.
    pub resolved_path: PathBuf,

    /// Skill name: the `name` field of the skill's pspm.json when present,
    /// otherwise the directory name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SkillManifestName {
    name: Option<String>,
}

impl LocalSkill {
    /// Validate a local path and derive the skill's name.
    pub fn resolve(project_root: &Path, path: &str) -> Result<Self, FetchError> {
        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            project_root.join(path)
        };

        let resolved_path = joined.canonicalize().map_err(|_| FetchError::NotFound {
            identity: format!("file:{path}"),
        })?;

        if !resolved_path.is_dir() {
            return Err(FetchError::InvalidLocalSkill {
                path: path.to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let manifest_path = resolved_path.join("pspm.json");
        let has_manifest = manifest_path.is_file();
        if !has_manifest && !resolved_path.join("SKILL.md").is_file() {
            return Err(FetchError::InvalidLocalSkill {
                path: path.to_string(),
                reason: "missing SKILL.md or pspm.json".to_string(),
            });
        }

        let name = manifest_name(&manifest_path)
            .or_else(|| {
                resolved_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .ok_or_else(|| FetchError::InvalidLocalSkill {
                path: path.to_string(),
                reason: "cannot derive a skill name".to_string(),
            })?;

        Ok(LocalSkill {
            path: path.to_string(),
            resolved_path,
            name,
        })
    }
}

fn manifest_name(manifest_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(manifest_path).ok()?;
    let parsed: SkillManifestName = serde_json::from_str(&content).ok()?;
    parsed.name.filter(|n| !n.is_empty())
}
