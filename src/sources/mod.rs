//! Skill sources.
//!
//! Sources are responsible for acquiring skill payloads from the three
//! supply channels: the HTTP registry, GitHub repositories, and local
//! directories.

pub mod cache;
pub mod github;
pub mod local;
pub mod registry;

pub use cache::ContentCache;
pub use github::GitHubClient;
pub use local::LocalSkill;
pub use registry::RegistryClient;

use thiserror::Error;

/// A fetch failure, classified for user-facing reporting.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("`{identity}` was not found")]
    NotFound { identity: String },

    #[error("authentication required for `{identity}`")]
    AuthRequired { identity: String },

    #[error("access denied for `{identity}`")]
    AuthDenied { identity: String },

    #[error("GitHub rate limit exceeded while fetching `{identity}`")]
    RateLimited { identity: String },

    #[error("integrity mismatch for `{identity}`: expected {expected}, got {actual}")]
    IntegrityMismatch {
        identity: String,
        expected: String,
        actual: String,
    },

    #[error("request for `{identity}` timed out")]
    Timeout { identity: String },

    #[error("failed to fetch `{identity}`: {message}")]
    Transport { identity: String, message: String },

    #[error("`{path}` is not a skill directory: {reason}")]
    InvalidLocalSkill { path: String, reason: String },
}

impl FetchError {
    /// Map a reqwest failure to the taxonomy.
    pub fn from_http(identity: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                identity: identity.to_string(),
            }
        } else {
            FetchError::Transport {
                identity: identity.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_identity() {
        let err = FetchError::NotFound {
            identity: "@user/alice/a".into(),
        };
        assert!(err.to_string().contains("@user/alice/a"));

        let err = FetchError::IntegrityMismatch {
            identity: "@user/alice/a".into(),
            expected: "sha256-xxx".into(),
            actual: "sha256-yyy".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sha256-xxx") && msg.contains("sha256-yyy"));
    }
}
