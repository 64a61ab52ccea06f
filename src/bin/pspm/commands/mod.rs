//! Command implementations.

pub mod add;
pub mod completions;
pub mod install;
pub mod link;
pub mod remove;

use pspm::util::config::DEFAULT_REGISTRY_URL;
use pspm::{Config, ProjectContext};

/// Build the command-wide configuration from flags and environment.
pub fn build_config(registry: Option<String>, frozen: bool) -> Config {
    let registry_url = registry
        .or_else(|| std::env::var("PSPM_REGISTRY_URL").ok())
        .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());

    Config::new(registry_url)
        .with_token(std::env::var("PSPM_API_KEY").ok())
        .with_github_token(std::env::var("GITHUB_TOKEN").ok())
        .frozen(frozen)
}

/// Project context rooted at the current directory.
pub fn project_context() -> anyhow::Result<ProjectContext> {
    let cwd = std::env::current_dir()?;
    Ok(ProjectContext::new(cwd))
}

/// Turn a repeatable `--agent` flag into the orchestrator's option.
pub fn agent_selection(agents: Vec<String>) -> Option<Vec<String>> {
    if agents.is_empty() {
        None
    } else {
        Some(agents)
    }
}
