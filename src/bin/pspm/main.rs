//! pspm CLI - a package manager for agent skills

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pspm::util::diagnostic::ResolutionFailure;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        // Resolver failures carry structured diagnostics; render those
        // through miette so every conflict shows with its remedy.
        match e.downcast::<ResolutionFailure>() {
            Ok(failure) => eprint!("{:?}", miette::Report::new(failure)),
            Err(other) => eprintln!("error: {:#}", other),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("pspm=debug")
    } else if cli.quiet {
        EnvFilter::new("pspm=error")
    } else {
        EnvFilter::new("pspm=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Add(args) => commands::add::execute(args),
        Commands::Install(args) => commands::install::execute(args),
        Commands::Remove(args) => commands::remove::execute(args),
        Commands::Link(args) => commands::link::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
