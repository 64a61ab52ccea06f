//! Runtime configuration for pspm commands.
//!
//! One `Config` value is constructed at command start (from CLI flags and
//! environment, outside the library) and passed explicitly through the
//! pipeline. The library itself never reads ambient state.

use std::time::Duration;

/// Default registry API base URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://pspm.dev";

/// Configuration captured once per command.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry API base URL.
    pub registry_url: String,

    /// Registry bearer token, when the user is logged in.
    pub token: Option<String>,

    /// GitHub bearer token (`GITHUB_TOKEN`), when set.
    pub github_token: Option<String>,

    /// Request-level deadline for network operations.
    pub timeout: Option<Duration>,

    /// Refuse any fetch not already pinned by the lockfile.
    pub frozen_lockfile: bool,
}

impl Config {
    /// Config pointing at the default registry, anonymous.
    pub fn new(registry_url: impl Into<String>) -> Self {
        Config {
            registry_url: registry_url.into(),
            token: None,
            github_token: None,
            timeout: None,
            frozen_lockfile: false,
        }
    }

    /// Set the registry token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the GitHub token.
    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    /// Set the network deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable frozen-lockfile mode.
    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen_lockfile = frozen;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(DEFAULT_REGISTRY_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = Config::default()
            .with_token(Some("tok".into()))
            .frozen(true);
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.token.as_deref(), Some("tok"));
        assert!(config.frozen_lockfile);
        assert!(config.github_token.is_none());
    }
}
