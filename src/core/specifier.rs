//! Skill specifier parsing.
//!
//! A specifier is the textual reference a user writes for a dependency.
//! Three grammars are accepted:
//!
//! - registry:  `@user/<username>/<name>[@<range>]`
//! - github:    `github:<owner>/<repo>[/<path>][@<ref>]`
//! - local:     `file:<path>`, or a bare `./x` / `../x`
//!
//! Classification is precedence-based: `file:`, `./`, `../` win first, then
//! `github:`, then the registry grammar is required. No version-range
//! inference happens here; ranges are strings passed downstream.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());
static SKILL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").unwrap());

/// A parsed dependency specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// `@user/<username>/<name>[@<range>]`
    Registry {
        username: String,
        name: String,
        /// Semver range string; `None` means "highest".
        range: Option<String>,
    },

    /// `github:<owner>/<repo>[/<path>][@<ref>]`
    GitHub {
        owner: String,
        repo: String,
        /// Subpath inside the repository, when the skill is not at the root.
        path: Option<String>,
        /// Branch, tag, or commit-ish; `None` means the default branch.
        reference: Option<String>,
    },

    /// `file:<path>` with the path exactly as given.
    Local { path: String },
}

/// Typed rejection of an unparsable specifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecifierError {
    #[error("invalid registry specifier `{0}`: expected @user/<username>/<name>[@<range>]")]
    InvalidRegistry(String),

    #[error("invalid username in `{specifier}`: `{username}` may only contain letters, digits, `_` and `-`")]
    InvalidUsername { specifier: String, username: String },

    #[error("invalid skill name in `{specifier}`: `{name}` must start with a lowercase letter")]
    InvalidSkillName { specifier: String, name: String },

    #[error("invalid github specifier `{0}`: expected github:<owner>/<repo>[/<path>][@<ref>]")]
    InvalidGitHub(String),

    #[error("invalid local specifier `{0}`: path is empty")]
    EmptyLocalPath(String),

    #[error("unrecognised specifier `{0}`")]
    Unrecognised(String),
}

impl Specifier {
    /// Parse a specifier string.
    pub fn parse(input: &str) -> Result<Self, SpecifierError> {
        let trimmed = input.trim();

        if let Some(path) = trimmed.strip_prefix("file:") {
            if path.is_empty() {
                return Err(SpecifierError::EmptyLocalPath(input.to_string()));
            }
            return Ok(Specifier::Local {
                path: path.to_string(),
            });
        }
        if trimmed.starts_with("./") || trimmed.starts_with("../") {
            return Ok(Specifier::Local {
                path: trimmed.to_string(),
            });
        }

        if let Some(rest) = trimmed.strip_prefix("github:") {
            return Self::parse_github(trimmed, rest);
        }

        if trimmed.starts_with("@user/") {
            return Self::parse_registry(trimmed);
        }

        Err(SpecifierError::Unrecognised(input.to_string()))
    }

    fn parse_registry(input: &str) -> Result<Self, SpecifierError> {
        let rest = &input["@user/".len()..];

        // The range separator is an `@` after the name; the leading `@user/`
        // was already stripped so any remaining `@` splits off the range.
        let (ident, range) = match rest.find('@') {
            Some(at) => (&rest[..at], Some(rest[at + 1..].to_string())),
            None => (rest, None),
        };

        let mut parts = ident.splitn(2, '/');
        let username = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SpecifierError::InvalidRegistry(input.to_string()))?;
        let name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SpecifierError::InvalidRegistry(input.to_string()))?;

        if !USERNAME_RE.is_match(username) {
            return Err(SpecifierError::InvalidUsername {
                specifier: input.to_string(),
                username: username.to_string(),
            });
        }
        if !SKILL_NAME_RE.is_match(name) {
            return Err(SpecifierError::InvalidSkillName {
                specifier: input.to_string(),
                name: name.to_string(),
            });
        }

        Ok(Specifier::Registry {
            username: username.to_string(),
            name: name.to_string(),
            range,
        })
    }

    fn parse_github(input: &str, rest: &str) -> Result<Self, SpecifierError> {
        // Split on the last `@` that sits past the owner/repo segment. An
        // `@` before the first `/` would be part of an owner name and is
        // not a ref separator.
        let first_slash = rest
            .find('/')
            .ok_or_else(|| SpecifierError::InvalidGitHub(input.to_string()))?;
        let (locator, reference) = match rest.rfind('@') {
            Some(at) if at > first_slash => {
                (&rest[..at], Some(rest[at + 1..].to_string()))
            }
            _ => (rest, None),
        };

        let mut segments = locator.split('/');
        let owner = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SpecifierError::InvalidGitHub(input.to_string()))?;
        let repo = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SpecifierError::InvalidGitHub(input.to_string()))?;

        let path: Vec<&str> = segments.collect();
        if path.iter().any(|s| s.is_empty()) {
            return Err(SpecifierError::InvalidGitHub(input.to_string()));
        }
        let path = if path.is_empty() {
            None
        } else {
            Some(path.join("/"))
        };

        if reference.as_deref() == Some("") {
            return Err(SpecifierError::InvalidGitHub(input.to_string()));
        }

        Ok(Specifier::GitHub {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path,
            reference,
        })
    }

    /// The identity key used in manifest and lockfile maps.
    ///
    /// GitHub keys deliberately exclude the ref so specifiers differing
    /// only in branch collide (last write wins). Local keys carry the path
    /// exactly as given.
    pub fn key(&self) -> String {
        match self {
            Specifier::Registry { username, name, .. } => {
                format!("@user/{username}/{name}")
            }
            Specifier::GitHub {
                owner, repo, path, ..
            } => match path {
                Some(p) => format!("github:{owner}/{repo}/{p}"),
                None => format!("github:{owner}/{repo}"),
            },
            Specifier::Local { path } => format!("file:{path}"),
        }
    }

    /// Round-trip the specifier back to its textual form. Bare local paths
    /// normalise to the `file:` form.
    pub fn format(&self) -> String {
        match self {
            Specifier::Registry { range, .. } => match range {
                Some(r) => format!("{}@{}", self.key(), r),
                None => self.key(),
            },
            Specifier::GitHub { reference, .. } => match reference {
                Some(r) => format!("{}@{}", self.key(), r),
                None => self.key(),
            },
            Specifier::Local { .. } => self.key(),
        }
    }

    /// The skill name used for store layout and agent links.
    ///
    /// Registry skills use their name; GitHub skills use the last path
    /// segment (or the repo); local skills are named by the caller after
    /// inspecting the directory.
    pub fn default_skill_name(&self) -> &str {
        match self {
            Specifier::Registry { name, .. } => name,
            Specifier::GitHub { repo, path, .. } => match path {
                Some(p) => p.rsplit('/').next().unwrap_or(repo),
                None => repo,
            },
            Specifier::Local { path } => path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(path),
        }
    }

    /// True for `Specifier::Registry`.
    pub fn is_registry(&self) -> bool {
        matches!(self, Specifier::Registry { .. })
    }
}

impl std::fmt::Display for Specifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry() {
        let spec = Specifier::parse("@user/alice/code-review").unwrap();
        assert_eq!(
            spec,
            Specifier::Registry {
                username: "alice".into(),
                name: "code-review".into(),
                range: None,
            }
        );
        assert_eq!(spec.key(), "@user/alice/code-review");
    }

    #[test]
    fn test_parse_registry_with_range() {
        let spec = Specifier::parse("@user/alice/a@^1.2").unwrap();
        assert_eq!(
            spec,
            Specifier::Registry {
                username: "alice".into(),
                name: "a".into(),
                range: Some("^1.2".into()),
            }
        );
        // `latest` and `*` stay opaque strings here
        let spec = Specifier::parse("@user/alice/a@latest").unwrap();
        assert!(matches!(spec, Specifier::Registry { range: Some(r), .. } if r == "latest"));
    }

    #[test]
    fn test_registry_name_rules() {
        assert!(matches!(
            Specifier::parse("@user/alice/Bad"),
            Err(SpecifierError::InvalidSkillName { .. })
        ));
        assert!(matches!(
            Specifier::parse("@user/al ice/a"),
            Err(SpecifierError::InvalidUsername { .. })
        ));
        assert!(matches!(
            Specifier::parse("@user/alice"),
            Err(SpecifierError::InvalidRegistry(_))
        ));
        // digits and underscores allowed after the first letter
        assert!(Specifier::parse("@user/Bob_1/skill2_x").is_ok());
    }

    #[test]
    fn test_parse_github() {
        let spec = Specifier::parse("github:acme/prompts").unwrap();
        assert_eq!(
            spec,
            Specifier::GitHub {
                owner: "acme".into(),
                repo: "prompts".into(),
                path: None,
                reference: None,
            }
        );
    }

    #[test]
    fn test_parse_github_subpath_and_ref() {
        let spec = Specifier::parse("github:acme/prompts/skills/review@v2").unwrap();
        assert_eq!(
            spec,
            Specifier::GitHub {
                owner: "acme".into(),
                repo: "prompts".into(),
                path: Some("skills/review".into()),
                reference: Some("v2".into()),
            }
        );
        // ref excluded from identity
        assert_eq!(spec.key(), "github:acme/prompts/skills/review");
        assert_eq!(spec.default_skill_name(), "review");
    }

    #[test]
    fn test_github_ref_with_slashes() {
        // branch names may contain `/`; the last `@` wins
        let spec = Specifier::parse("github:acme/prompts@feature/new-stuff").unwrap();
        assert_eq!(
            spec,
            Specifier::GitHub {
                owner: "acme".into(),
                repo: "prompts".into(),
                path: None,
                reference: Some("feature/new-stuff".into()),
            }
        );
    }

    #[test]
    fn test_parse_local() {
        assert_eq!(
            Specifier::parse("file:../my-skill").unwrap(),
            Specifier::Local {
                path: "../my-skill".into()
            }
        );
        assert_eq!(
            Specifier::parse("../my-skill").unwrap(),
            Specifier::Local {
                path: "../my-skill".into()
            }
        );
        assert_eq!(
            Specifier::parse("./skills/x").unwrap(),
            Specifier::Local {
                path: "./skills/x".into()
            }
        );
        assert_eq!(
            Specifier::parse("file:/abs/path").unwrap().key(),
            "file:/abs/path"
        );
    }

    #[test]
    fn test_roundtrip_format() {
        for s in [
            "@user/alice/a",
            "@user/alice/a@^1.2",
            "@user/alice/a@>=1.2 <2",
            "github:acme/prompts",
            "github:acme/prompts/skills/review@v2",
            "file:../my-skill",
        ] {
            assert_eq!(Specifier::parse(s).unwrap().format(), s);
        }
        // bare paths normalise to the file: form, then round-trip
        let normalised = Specifier::parse("../my-skill").unwrap().format();
        assert_eq!(normalised, "file:../my-skill");
        assert_eq!(Specifier::parse(&normalised).unwrap().format(), normalised);
    }

    #[test]
    fn test_unrecognised() {
        assert!(matches!(
            Specifier::parse("not-a-spec"),
            Err(SpecifierError::Unrecognised(_))
        ));
        assert!(matches!(
            Specifier::parse("github:justowner"),
            Err(SpecifierError::InvalidGitHub(_))
        ));
        assert!(matches!(
            Specifier::parse("file:"),
            Err(SpecifierError::EmptyLocalPath(_))
        ));
    }
}
