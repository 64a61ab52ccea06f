//! `pspm remove` - drop a dependency and everything it placed on disk.

use anyhow::Result;

use crate::cli::RemoveArgs;
use crate::commands::{build_config, project_context};

pub fn execute(args: RemoveArgs) -> Result<()> {
    let ctx = project_context()?;
    let config = build_config(args.registry, false);

    let report = pspm::ops::remove(&ctx, &config, &args.name)?;
    for key in &report.removed {
        println!("- {key}");
    }
    Ok(())
}
