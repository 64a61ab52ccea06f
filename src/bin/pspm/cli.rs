//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// pspm - a package manager for agent skills
#[derive(Parser)]
#[command(name = "pspm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug/info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add skill dependencies and install them
    Add(AddArgs),

    /// Install the dependencies declared in pspm.json
    Install(InstallArgs),

    /// Remove a skill dependency
    Remove(RemoveArgs),

    /// Rebuild agent symlinks from the lockfile
    Link(LinkArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct AddArgs {
    /// Specifiers: @user/<name>/<skill>[@range], github:owner/repo[/path][@ref], or a local path
    #[arg(required = true)]
    pub specifiers: Vec<String>,

    /// Agents to link skills into (use `none` to skip linking)
    #[arg(long = "agent")]
    pub agents: Vec<String>,

    /// Registry URL override
    #[arg(long, env = "PSPM_REGISTRY_URL")]
    pub registry: Option<String>,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Specifiers to add before installing (delegates to `add`)
    pub specifiers: Vec<String>,

    /// Refuse any fetch not already pinned by the lockfile
    #[arg(long)]
    pub frozen_lockfile: bool,

    /// Agents to link skills into (use `none` to skip linking)
    #[arg(long = "agent")]
    pub agents: Vec<String>,

    /// Registry URL override
    #[arg(long, env = "PSPM_REGISTRY_URL")]
    pub registry: Option<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Dependency to remove: a specifier, identity key, or skill name
    pub name: String,

    /// Registry URL override
    #[arg(long, env = "PSPM_REGISTRY_URL")]
    pub registry: Option<String>,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Agents to link skills into (use `none` to skip linking)
    #[arg(long = "agent")]
    pub agents: Vec<String>,

    /// Registry URL override
    #[arg(long, env = "PSPM_REGISTRY_URL")]
    pub registry: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
