//! Implementation of `pspm remove`.
//!
//! Removal undoes everything an install created for one dependency: the
//! manifest entry, the lockfile entry, the store payload, and any agent
//! symlinks that point at the removed store path.


use anyhow::{bail, Result};

use crate::core::agent;
use crate::core::{Lockfile, Manifest, Specifier};
use crate::util::{fs, Config, ProjectContext};

/// The result of a removal.
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// Identity keys removed.
    pub removed: Vec<String>,

    /// Agent links deleted.
    pub unlinked: Vec<std::path::PathBuf>,
}

/// Remove a dependency named by its specifier or identity key. A bare
/// skill name is matched against the installed skills' link names.
pub fn remove(ctx: &ProjectContext, config: &Config, raw: &str) -> Result<RemoveReport> {
    let mut manifest = Manifest::load(&ctx.manifest_path())?;
    let mut lockfile = Lockfile::load(&ctx.lockfile_path(), &ctx.legacy_lockfile_path())?
        .unwrap_or_else(|| Lockfile::new(&config.registry_url));

    let Some(key) = find_key(raw, &manifest, &lockfile) else {
        bail!("dependency `{raw}` is not installed");
    };

    let mut report = RemoveReport::default();

    // Identify the store path and link name before the entries disappear.
    let (store_abs, link_name) = locate(ctx, &key, &lockfile)?;

    manifest.remove_dependency(&key);
    manifest.save(&ctx.manifest_path())?;

    lockfile.remove(&key);
    lockfile.save(&ctx.lockfile_path(), &ctx.legacy_lockfile_path())?;

    // Store payloads are directories for fetched skills, symlinks for
    // local skills.
    if fs::read_link_if_symlink(&store_abs).is_some() {
        std::fs::remove_file(&store_abs)?;
    } else {
        fs::remove_dir_all_if_exists(&store_abs)?;
    }

    // Drop agent links that point into the removed store path.
    let store_rel_target = |agent_dir: &std::path::Path| {
        fs::relative_path(agent_dir, &store_abs)
    };
    let mut agent_dirs: Vec<String> = agent::built_in_agent_names()
        .iter()
        .filter_map(|name| agent::skills_dir(name, &manifest.agents))
        .collect();
    for agent_config in manifest.agents.values() {
        if !agent_dirs.contains(&agent_config.skills_dir) {
            agent_dirs.push(agent_config.skills_dir.clone());
        }
    }

    for dir in agent_dirs {
        let agent_dir = ctx.root().join(&dir);
        let link = agent_dir.join(&link_name);
        if let Some(target) = fs::read_link_if_symlink(&link) {
            if target == store_rel_target(&agent_dir) {
                std::fs::remove_file(&link)?;
                report.unlinked.push(link);
            }
        }
    }

    report.removed.push(key);
    Ok(report)
}

/// Match user input to an installed identity key: exact key, parseable
/// specifier, or bare link name.
fn find_key(raw: &str, manifest: &Manifest, lockfile: &Lockfile) -> Option<String> {
    let known = |key: &str| {
        manifest.dependencies.contains_key(key)
            || manifest.github_dependencies.contains_key(key)
            || manifest.local_dependencies.contains_key(key)
            || lockfile.packages.contains_key(key)
            || lockfile.github_packages.contains_key(key)
            || lockfile.local_packages.contains_key(key)
    };

    if known(raw) {
        return Some(raw.to_string());
    }
    if let Ok(spec) = Specifier::parse(raw) {
        let key = spec.key();
        if known(&key) {
            return Some(key);
        }
    }

    // bare name: search by link name
    let all_keys: Vec<&String> = manifest
        .dependencies
        .keys()
        .chain(manifest.github_dependencies.keys())
        .chain(manifest.local_dependencies.keys())
        .collect();
    for key in all_keys {
        if let Ok(spec) = Specifier::parse(key) {
            if spec.default_skill_name() == raw {
                return Some(key.clone());
            }
        }
    }
    lockfile
        .local_packages
        .iter()
        .find(|(_, entry)| entry.name == raw)
        .map(|(key, _)| key.clone())
}

/// Derive the store path and agent link name for an identity key.
fn locate(
    ctx: &ProjectContext,
    key: &str,
    lockfile: &Lockfile,
) -> Result<(std::path::PathBuf, String)> {
    match Specifier::parse(key) {
        Ok(Specifier::Registry { username, name, .. }) => {
            Ok((ctx.registry_store_path(&username, &name), name))
        }
        Ok(Specifier::GitHub {
            owner, repo, path, ..
        }) => {
            let name = match &path {
                Some(p) => p.rsplit('/').next().unwrap_or(&repo).to_string(),
                None => repo.clone(),
            };
            Ok((
                ctx.github_store_path(&owner, &repo, path.as_deref()),
                name,
            ))
        }
        Ok(Specifier::Local { .. }) => {
            let name = lockfile
                .local_packages
                .get(key)
                .map(|entry| entry.name.clone())
                .or_else(|| {
                    Specifier::parse(key)
                        .ok()
                        .map(|s| s.default_skill_name().to_string())
                })
                .unwrap_or_else(|| key.to_string());
            Ok((ctx.local_store_path(&name), name))
        }
        Err(err) => bail!("cannot interpret `{key}`: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::install::{InstallOptions, Installer};
    use tempfile::TempDir;

    #[test]
    fn test_remove_local_skill_cleans_everything() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        let skill_dir = tmp.path().join("my-skill");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# s").unwrap();

        let ctx = ProjectContext::new(&project);
        let config = Config::new("https://registry.test");
        let installer = Installer::new(&ctx, &config).unwrap();
        installer
            .add(
                &["../my-skill".to_string()],
                &InstallOptions {
                    agents: Some(vec!["claude-code".to_string()]),
                },
            )
            .unwrap();

        assert!(fs::entry_exists(&project.join(".pspm/skills/_local/my-skill")));
        assert!(fs::entry_exists(&project.join(".claude/skills/my-skill")));

        let report = remove(&ctx, &config, "my-skill").unwrap();
        assert_eq!(report.removed, vec!["file:../my-skill"]);

        let manifest = Manifest::load(&ctx.manifest_path()).unwrap();
        assert!(!manifest.has_dependencies());
        let lockfile = Lockfile::load(&ctx.lockfile_path(), &ctx.legacy_lockfile_path())
            .unwrap()
            .unwrap();
        assert!(lockfile.is_empty());
        assert!(!fs::entry_exists(&project.join(".pspm/skills/_local/my-skill")));
        assert!(!fs::entry_exists(&project.join(".claude/skills/my-skill")));
        // the skill source itself is untouched
        assert!(skill_dir.join("SKILL.md").exists());
    }

    #[test]
    fn test_remove_unknown_dependency_errors() {
        let tmp = TempDir::new().unwrap();
        let ctx = ProjectContext::new(tmp.path());
        let config = Config::new("https://registry.test");
        let err = remove(&ctx, &config, "@user/alice/ghost").unwrap_err();
        assert!(err.to_string().contains("@user/alice/ghost"));
    }

    #[test]
    fn test_remove_accepts_full_key() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        let skill_dir = tmp.path().join("other");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# o").unwrap();

        let ctx = ProjectContext::new(&project);
        let config = Config::new("https://registry.test");
        let installer = Installer::new(&ctx, &config).unwrap();
        installer
            .add(
                &["../other".to_string()],
                &InstallOptions {
                    agents: Some(vec![crate::core::agent::AGENT_NONE.to_string()]),
                },
            )
            .unwrap();

        let report = remove(&ctx, &config, "file:../other").unwrap();
        assert_eq!(report.removed, vec!["file:../other"]);
        assert!(report.unlinked.is_empty());
    }
}
