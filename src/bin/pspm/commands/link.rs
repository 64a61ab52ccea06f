//! `pspm link` - rebuild agent symlinks from the lockfile.

use anyhow::Result;

use pspm::ops::LinkOutcome;
use pspm::{InstallOptions, Installer};

use crate::cli::LinkArgs;
use crate::commands::{agent_selection, build_config, project_context};

pub fn execute(args: LinkArgs) -> Result<()> {
    let ctx = project_context()?;
    let config = build_config(args.registry, false);
    let installer = Installer::new(&ctx, &config)?;

    let options = InstallOptions {
        agents: agent_selection(args.agents),
    };
    let report = installer.link(&options)?;

    let changed = report
        .outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, LinkOutcome::Created | LinkOutcome::Replaced))
        .count();
    println!("{changed} link(s) updated");

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
