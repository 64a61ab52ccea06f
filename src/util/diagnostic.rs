//! User-facing failure reporting.
//!
//! Every failure surfaced to the user identifies the offending specifier
//! or skill, the kind of failure, and a concrete remedy. Resolver
//! failures are aggregated into a [`ResolutionFailure`] so one run can
//! report every conflict and missing skill at once; the binary renders it
//! through miette.

use std::fmt;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a request needs authentication.
    pub const LOGIN_NEEDED: &str = "help: Run `pspm login` to authenticate";

    /// Suggestion when GitHub rate-limits an anonymous caller.
    pub const SET_GITHUB_TOKEN: &str =
        "help: Set the GITHUB_TOKEN environment variable to raise the rate limit";

    /// Suggestion when frozen-lockfile installs hit a stale lockfile.
    pub const STALE_LOCK: &str =
        "help: The lockfile is stale - rerun without --frozen-lockfile to refresh it";

    /// Suggestion when a dependency is missing from the manifest.
    pub const MISSING_DEPENDENCY: &str = "help: Run `pspm add <specifier>` to add it";

    /// Suggestion for fetch failures.
    pub const FETCH_FAILED: &str = "help: Check your network connection and retry";
}

/// One concrete problem with a skill dependency.
///
/// The message names the skill, `details` carry the evidence (which
/// dependent wants which range, which versions exist), and `help` is the
/// remedy. Rendered by miette when the command fails, so the help text
/// must not repeat a `help:` prefix.
#[derive(Debug)]
pub struct Diagnostic {
    message: String,
    details: Vec<String>,
    help: Option<String>,
}

impl Diagnostic {
    /// Start a diagnostic from the primary message.
    pub fn new(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            details: Vec::new(),
            help: None,
        }
    }

    /// Attach one line of evidence.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Attach the remedy.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for detail in &self.details {
            write!(f, "\n  {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

impl MietteDiagnostic for Diagnostic {
    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }
}

/// A failed resolver run: every conflict and error it collected.
///
/// Raised before any filesystem write, so the user sees the full set of
/// problems from a single command invocation.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("failed to resolve skill dependencies")]
pub struct ResolutionFailure {
    #[related]
    pub problems: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_details() {
        let diag = Diagnostic::new("version conflict for `@user/carol/util`")
            .with_detail("`@user/alice/a` requires @user/carol/util ^1.0.0")
            .with_detail("`@user/bob/b` requires @user/carol/util ^2.0.0")
            .with_help("Relax one of the conflicting ranges");

        let output = diag.to_string();
        assert!(output.starts_with("version conflict"));
        assert!(output.contains("\n  `@user/alice/a` requires"));
        assert!(output.contains("`@user/bob/b`"));
        // the remedy is rendered by miette, not Display
        assert!(!output.contains("Relax"));
    }

    #[test]
    fn test_miette_exposes_help() {
        let diag = Diagnostic::new("could not find skill `@user/alice/ghost`")
            .with_help("Check that the skill name is spelled correctly");
        let help = MietteDiagnostic::help(&diag).unwrap().to_string();
        assert_eq!(help, "Check that the skill name is spelled correctly");

        let bare = Diagnostic::new("plain");
        assert!(MietteDiagnostic::help(&bare).is_none());
    }

    #[test]
    fn test_resolution_failure_relates_problems() {
        let failure = ResolutionFailure {
            problems: vec![
                Diagnostic::new("could not find skill `@user/alice/ghost`"),
                Diagnostic::new("no version of `@user/bob/b` matches ^9"),
            ],
        };
        assert_eq!(failure.to_string(), "failed to resolve skill dependencies");
        let related: Vec<_> = MietteDiagnostic::related(&failure)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(related.len(), 2);
    }
}
