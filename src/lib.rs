//! pspm - a package manager for agent skills
//!
//! This crate provides the core library functionality for pspm: specifier
//! parsing, dependency resolution, content-addressed caching, store
//! extraction, and agent linking.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

pub use core::{Lockfile, Manifest, Specifier};
pub use ops::{InstallOptions, Installer};
pub use util::{Config, Integrity, ProjectContext};
