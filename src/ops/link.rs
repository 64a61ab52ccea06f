//! Agent linking: projecting installed skills into per-agent directories.
//!
//! Each installed skill gets a relative symlink
//! `<agentSkillsDir>/<name> -> <store path>` so a checked-out project keeps
//! working when the directory moves. Reconciliation inspects the link
//! itself, never its resolved target, and refuses to touch anything that
//! is not a symlink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::agent;
use crate::core::manifest::AgentConfig;
use crate::util::fs;

/// One skill to project: its link name and its path under the store.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    /// Link name inside the agent directory.
    pub name: String,

    /// Store path relative to the project root (e.g.
    /// `.pspm/skills/alice/a`).
    pub store_path: PathBuf,
}

/// What happened at one link site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Unchanged,
    Replaced,
    /// A regular file or directory occupies the path; left untouched.
    Occupied,
}

/// Result of linking one agent.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub outcomes: Vec<(PathBuf, LinkOutcome)>,
    pub warnings: Vec<String>,
}

impl LinkReport {
    fn merge(&mut self, other: LinkReport) {
        self.outcomes.extend(other.outcomes);
        self.warnings.extend(other.warnings);
    }
}

/// Link every skill into every selected agent directory.
///
/// Unknown agent names warn and are skipped. The caller filters out the
/// `none` agent before getting here.
pub fn link_agents(
    project_root: &Path,
    skills: &[LinkRequest],
    agents: &[String],
    overrides: &BTreeMap<String, AgentConfig>,
) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    for agent_name in agents {
        debug_assert_ne!(agent_name.as_str(), agent::AGENT_NONE);

        let Some(skills_dir) = agent::skills_dir(agent_name, overrides) else {
            tracing::warn!("unknown agent `{agent_name}`, skipping");
            report
                .warnings
                .push(format!("unknown agent `{agent_name}`, skipping"));
            continue;
        };

        let agent_dir = project_root.join(&skills_dir);
        fs::ensure_dir(&agent_dir)?;

        report.merge(link_into(project_root, &agent_dir, skills)?);
    }

    Ok(report)
}

/// Link skills into a single agent directory.
fn link_into(project_root: &Path, agent_dir: &Path, skills: &[LinkRequest]) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    for skill in skills {
        let symlink_path = agent_dir.join(&skill.name);
        let target_abs = project_root.join(&skill.store_path);
        let target_rel = fs::relative_path(agent_dir, &target_abs);

        let outcome = reconcile(&symlink_path, &target_rel)?;
        if outcome == LinkOutcome::Occupied {
            let warning = format!(
                "`{}` exists and is not a symlink; leaving it in place",
                symlink_path.display()
            );
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }
        report.outcomes.push((symlink_path, outcome));
    }

    Ok(report)
}

/// Reconcile one link site against its desired relative target.
fn reconcile(symlink_path: &Path, target: &Path) -> Result<LinkOutcome> {
    match fs::read_link_if_symlink(symlink_path) {
        Some(existing) if existing == target => Ok(LinkOutcome::Unchanged),
        Some(_) => {
            std::fs::remove_file(symlink_path)?;
            fs::symlink(target, symlink_path)?;
            Ok(LinkOutcome::Replaced)
        }
        None if fs::entry_exists(symlink_path) => Ok(LinkOutcome::Occupied),
        None => {
            fs::symlink(target, symlink_path)?;
            Ok(LinkOutcome::Created)
        }
    }
}
