//! `pspm install` - reproduce the manifest's dependencies.

use anyhow::Result;

use pspm::{InstallOptions, Installer};

use crate::cli::InstallArgs;
use crate::commands::{agent_selection, build_config, project_context};

pub fn execute(args: InstallArgs) -> Result<()> {
    let ctx = project_context()?;
    let config = build_config(args.registry, args.frozen_lockfile);
    let installer = Installer::new(&ctx, &config)?;

    let options = InstallOptions {
        agents: agent_selection(args.agents),
    };

    // `install <specifiers...>` is `add`.
    let report = if args.specifiers.is_empty() {
        installer.install(&options)?
    } else {
        installer.add(&args.specifiers, &options)?
    };

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
