//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod integrity;

pub use config::Config;
pub use context::ProjectContext;
pub use diagnostic::Diagnostic;
pub use integrity::Integrity;
