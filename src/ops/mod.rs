//! High-level operations.
//!
//! This module contains the implementation of pspm commands.

pub mod extract;
pub mod install;
pub mod link;
pub mod remove;

pub use extract::{extract_tarball, Layout, PathNotFoundError};
pub use install::{InstallOptions, InstallReport, InstalledSkill, Installer};
pub use link::{link_agents, LinkOutcome, LinkReport, LinkRequest};
pub use remove::{remove, RemoveReport};
