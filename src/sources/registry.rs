//! Registry HTTP client and tarball fetcher.
//!
//! Two metadata operations are consumed by the resolver (versions list and
//! per-version metadata), plus the tarball download used at install time.
//! Requests carry `Authorization: Bearer <token>` when a token is
//! configured, except against presigned object-storage URLs where the
//! header would invalidate the signature.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::sources::FetchError;
use crate::util::config::Config;

/// Metadata for one published version.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionMetadata {
    /// Where the tarball lives (possibly a presigned object URL).
    #[serde(rename = "downloadUrl")]
    pub download_url: String,

    /// Lowercase-hex SHA-256 of the tarball.
    pub checksum: String,

    /// The version's own manifest, as far as the core reads it.
    #[serde(default)]
    pub manifest: VersionManifest,

    /// Present when the version has been deprecated.
    #[serde(rename = "deprecationMessage", default)]
    pub deprecation_message: Option<String>,
}

/// The slice of a skill manifest the resolver consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionManifest {
    /// Transitive registry dependencies: identity -> range.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct VersionListItem {
    version: String,
}

/// Version metadata interface the resolver works against. Lets resolver
/// tests run on an in-memory registry.
pub trait RegistryMetadata {
    /// List published version strings for a skill.
    fn list_versions(&self, username: &str, name: &str) -> Result<Vec<String>, FetchError>;

    /// Fetch metadata for one version.
    fn get_version(
        &self,
        username: &str,
        name: &str,
        version: &str,
    ) -> Result<VersionMetadata, FetchError>;
}

/// HTTP client for the skill registry.
pub struct RegistryClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl RegistryClient {
    /// Build a client from config (registry URL, token, deadline).
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("pspm/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(RegistryClient {
            base_url: config.registry_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http: builder.build()?,
        })
    }

    fn map_status(&self, identity: &str, status: StatusCode) -> Option<FetchError> {
        match status {
            StatusCode::NOT_FOUND => Some(FetchError::NotFound {
                identity: identity.to_string(),
            }),
            StatusCode::UNAUTHORIZED if self.token.is_none() => Some(FetchError::AuthRequired {
                identity: identity.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(FetchError::AuthDenied {
                identity: identity.to_string(),
            }),
            s if !s.is_success() => Some(FetchError::Transport {
                identity: identity.to_string(),
                message: format!("registry returned HTTP {}", s.as_u16()),
            }),
            _ => None,
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        identity: &str,
        url: &str,
    ) -> Result<T, FetchError> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| FetchError::from_http(identity, e))?;

        if let Some(err) = self.map_status(identity, response.status()) {
            return Err(err);
        }
        response.json().map_err(|e| FetchError::Transport {
            identity: identity.to_string(),
            message: format!("invalid registry response: {e}"),
        })
    }

    /// Download tarball bytes, following redirects and honouring the
    /// presigned-URL rule.
    pub fn download(&self, identity: &str, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Transport {
            identity: identity.to_string(),
            message: format!("invalid download URL `{url}`: {e}"),
        })?;

        let mut request = self.http.get(parsed.clone());
        if let Some(token) = &self.token {
            if !is_presigned_url(&parsed) {
                request = request.bearer_auth(token);
            }
        }
        let response = request
            .send()
            .map_err(|e| FetchError::from_http(identity, e))?;

        if let Some(err) = self.map_status(identity, response.status()) {
            return Err(err);
        }
        let bytes = response.bytes().map_err(|e| FetchError::from_http(identity, e))?;
        Ok(bytes.to_vec())
    }
}

impl RegistryMetadata for RegistryClient {
    fn list_versions(&self, username: &str, name: &str) -> Result<Vec<String>, FetchError> {
        let identity = format!("@user/{username}/{name}");
        let url = format!("{}/api/skills/{username}/{name}/versions", self.base_url);
        let items: Vec<VersionListItem> = self.get_json(&identity, &url)?;
        Ok(items.into_iter().map(|i| i.version).collect())
    }

    fn get_version(
        &self,
        username: &str,
        name: &str,
        version: &str,
    ) -> Result<VersionMetadata, FetchError> {
        let identity = format!("@user/{username}/{name}@{version}");
        let url = format!(
            "{}/api/skills/{username}/{name}/{version}",
            self.base_url
        );
        self.get_json(&identity, &url)
    }
}

/// Whether a download URL points at object storage with a presigned
/// signature, where an Authorization header must be suppressed.
pub fn is_presigned_url(url: &Url) -> bool {
    let presigned_host = url
        .host_str()
        .is_some_and(|h| h.ends_with(".r2.cloudflarestorage.com"));
    let presigned_query = url
        .query_pairs()
        .any(|(k, _)| k.eq_ignore_ascii_case("X-Amz-Signature"));
    presigned_host || presigned_query
}
