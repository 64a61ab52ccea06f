//! Core data structures for pspm.
//!
//! This module contains the foundational types used throughout pspm:
//! - Specifiers (the three source grammars)
//! - The pspm.json manifest
//! - The versioned pspm-lock.json lockfile
//! - The agent table

pub mod agent;
pub mod lockfile;
pub mod manifest;
pub mod specifier;

pub use lockfile::{GitHubEntry, LocalEntry, Lockfile, RegistryEntry, LOCKFILE_VERSION};
pub use manifest::{AgentConfig, Manifest};
pub use specifier::{Specifier, SpecifierError};
