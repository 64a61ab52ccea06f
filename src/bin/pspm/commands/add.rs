//! `pspm add` - add dependencies and install them.

use anyhow::Result;

use pspm::{InstallOptions, Installer};

use crate::cli::AddArgs;
use crate::commands::{agent_selection, build_config, project_context};

pub fn execute(args: AddArgs) -> Result<()> {
    let ctx = project_context()?;
    let config = build_config(args.registry, false);
    let installer = Installer::new(&ctx, &config)?;

    let options = InstallOptions {
        agents: agent_selection(args.agents),
    };
    let report = installer.add(&args.specifiers, &options)?;

    for skill in &report.installed {
        println!("+ {} {}", skill.key, skill.version);
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    for (identity, message) in &report.failures {
        eprintln!("error: {identity}: {message}");
    }

    if !report.success() {
        std::process::exit(1);
    }
    Ok(())
}
