//! GitHub source: ref resolution and tarball download over the GitHub API.
//!
//! Fetching a GitHub skill takes two metadata round-trips before the
//! tarball: repository metadata when the ref is absent (to learn the
//! default branch), then `commits/<ref>` to pin the exact commit. The
//! tarball is always requested by commit so a moving branch cannot change
//! what the lockfile describes.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::sources::FetchError;
use crate::util::config::Config;

const GITHUB_API: &str = "https://api.github.com";

/// A ref pinned to its commit.
#[derive(Debug, Clone)]
pub struct PinnedRef {
    /// Full commit SHA.
    pub commit: String,

    /// The ref that was resolved (the default branch when none was given).
    pub reference: String,
}

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitMetadata {
    sha: String,
}

/// Client for the GitHub REST API.
pub struct GitHubClient {
    token: Option<String>,
    http: Client,
    api_base: String,
}

impl GitHubClient {
    /// Build a client; uses `GITHUB_TOKEN` from config when present.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("pspm/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(GitHubClient {
            token: config.github_token.clone(),
            http: builder.build()?,
            api_base: GITHUB_API.to_string(),
        })
    }

    fn send(&self, identity: &str, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| FetchError::from_http(identity, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                identity: identity.to_string(),
            });
        }
        if status == StatusCode::FORBIDDEN && is_rate_limited(&response) {
            return Err(FetchError::RateLimited {
                identity: identity.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Transport {
                identity: identity.to_string(),
                message: format!("GitHub returned HTTP {}", status.as_u16()),
            });
        }
        Ok(response)
    }

    /// Resolve a ref (or the default branch) to an exact commit.
    ///
    /// An absent or `latest` ref means "the repository's default branch".
    pub fn resolve_commit(
        &self,
        owner: &str,
        repo: &str,
        reference: Option<&str>,
    ) -> Result<PinnedRef, FetchError> {
        let identity = format!("github:{owner}/{repo}");

        let reference = match reference {
            Some(r) if !r.is_empty() && r != "latest" => r.to_string(),
            _ => {
                let url = format!("{}/repos/{owner}/{repo}", self.api_base);
                let meta: RepoMetadata =
                    self.send(&identity, &url)?
                        .json()
                        .map_err(|e| FetchError::Transport {
                            identity: identity.clone(),
                            message: format!("invalid GitHub response: {e}"),
                        })?;
                meta.default_branch
            }
        };

        let url = format!("{}/repos/{owner}/{repo}/commits/{reference}", self.api_base);
        let commit: CommitMetadata =
            self.send(&identity, &url)?
                .json()
                .map_err(|e| FetchError::Transport {
                    identity: identity.clone(),
                    message: format!("invalid GitHub response: {e}"),
                })?;

        Ok(PinnedRef {
            commit: commit.sha,
            reference,
        })
    }

    /// Download the tarball for an exact commit, following redirects.
    pub fn download_tarball(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let identity = format!("github:{owner}/{repo}");
        let url = format!("{}/repos/{owner}/{repo}/tarball/{commit}", self.api_base);
        let response = self.send(&identity, &url)?;
        let bytes = response
            .bytes()
            .map_err(|e| FetchError::from_http(&identity, e))?;
        Ok(bytes.to_vec())
    }
}

/// GitHub signals an exhausted quota as a 403 with a zeroed remaining
/// counter, which must read differently from a permissions failure.
fn is_rate_limited(response: &reqwest::blocking::Response) -> bool {
    response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0")
}
