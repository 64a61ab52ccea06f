//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// One collected requirement on a package: who wants it and what range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeWitness {
    /// `"root"` for direct dependencies, otherwise the dependent's name.
    pub dependent: String,

    /// The requested range string.
    pub range: String,
}

/// A jointly-unsatisfiable requirement set.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    /// The contested package.
    pub package: String,

    /// Every requirement that was collected, with its dependent.
    pub ranges: Vec<RangeWitness>,

    /// Versions that actually exist, for the error message.
    pub available_versions: Vec<String>,
}

/// Error during dependency resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("skill not found: `{package}`")]
    PackageNotFound { package: String },

    #[error("no version of `{package}` satisfies the requested ranges")]
    NoSatisfyingVersion {
        package: String,
        ranges: Vec<String>,
        available: Vec<String>,
    },

    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("dependency chain exceeds maximum depth {max_depth}: {}", path.join(" -> "))]
    MaxDepthExceeded { path: Vec<String>, max_depth: u32 },

    #[error("failed to fetch metadata for `{package}`: {message}")]
    FetchError { package: String, message: String },
}

impl ResolveError {
    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::PackageNotFound { package } => {
                Diagnostic::new(format!("could not find skill `{}`", package))
                    .with_help("Check that the skill name is spelled correctly")
            }

            ResolveError::NoSatisfyingVersion {
                package,
                ranges,
                available,
            } => {
                let mut diag = Diagnostic::new(format!(
                    "no version of `{}` matches {}",
                    package,
                    ranges.join(" and ")
                ));
                if !available.is_empty() {
                    diag =
                        diag.with_detail(format!("available versions: {}", available.join(", ")));
                }
                diag.with_help(format!("Relax your version requirement for `{}`", package))
            }

            ResolveError::CircularDependency { path } => {
                Diagnostic::new("circular dependency detected")
                    .with_detail(format!("cycle: {}", path.join(" -> ")))
            }

            ResolveError::MaxDepthExceeded { path, max_depth } => {
                Diagnostic::new(format!("dependency chain deeper than {}", max_depth))
                    .with_detail(format!("chain: {}", path.join(" -> ")))
            }

            ResolveError::FetchError { package, message } => {
                Diagnostic::new(format!("error fetching `{}`: {}", package, message))
                    .with_help("Check your network connection and retry")
            }
        }
    }
}

impl VersionConflict {
    /// Convert to a user-facing diagnostic listing every dependent.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::new(format!("version conflict for `{}`", self.package));
        for witness in &self.ranges {
            diag = diag.with_detail(format!(
                "`{}` requires {} {}",
                witness.dependent, self.package, witness.range
            ));
        }
        if !self.available_versions.is_empty() {
            diag = diag.with_detail(format!(
                "available versions: {}",
                self.available_versions.join(", ")
            ));
        }
        diag.with_help(format!(
            "Upgrade the dependents to compatible versions of `{}`",
            self.package
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_diagnostic_lists_witnesses() {
        let conflict = VersionConflict {
            package: "@user/carol/util".to_string(),
            ranges: vec![
                RangeWitness {
                    dependent: "@user/alice/a".to_string(),
                    range: "^1.0.0".to_string(),
                },
                RangeWitness {
                    dependent: "@user/bob/b".to_string(),
                    range: "^2.0.0".to_string(),
                },
            ],
            available_versions: vec!["1.0.0".to_string(), "2.0.0".to_string()],
        };

        let output = conflict.to_diagnostic().to_string();
        assert!(output.contains("version conflict"));
        assert!(output.contains("@user/alice/a"));
        assert!(output.contains("@user/bob/b"));
        assert!(output.contains("^1.0.0"));
        assert!(output.contains("available versions: 1.0.0, 2.0.0"));
    }

    #[test]
    fn test_cycle_diagnostic() {
        let err = ResolveError::CircularDependency {
            path: vec![
                "@user/a/x".to_string(),
                "@user/b/y".to_string(),
                "@user/a/x".to_string(),
            ],
        };
        let output = err.to_diagnostic().to_string();
        assert!(output.contains("@user/a/x -> @user/b/y -> @user/a/x"));
    }
}
