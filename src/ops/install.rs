//! The install pipeline behind `pspm add` and `pspm install`.
//!
//! Both entry points share one pipeline: validate specifiers, resolve the
//! registry graph, select agents, then execute the plan in topological
//! order (registry nodes first, then GitHub, then local). Each package
//! runs `fetch -> verify -> extract -> lockfile update -> manifest save ->
//! link` strictly in sequence; the lockfile is written after each package
//! so a crash leaves either the prior state or a prefix of the target
//! state. Install-time failures are per-package; resolver failures abort
//! before anything touches disk.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;

use crate::core::agent::{built_in_agent_names, AGENT_NONE};
use crate::core::{GitHubEntry, LocalEntry, Lockfile, Manifest, RegistryEntry, Specifier};
use crate::ops::extract::{extract_tarball, Layout};
use crate::ops::link::{link_agents, LinkReport, LinkRequest};
use crate::resolver::{Resolution, Resolver, ResolverConfig};
use crate::sources::github::PinnedRef;
use crate::sources::registry::RegistryMetadata;
use crate::sources::{ContentCache, FetchError, GitHubClient, LocalSkill, RegistryClient};
use crate::util::diagnostic::{suggestions, ResolutionFailure};
use crate::util::integrity::Integrity;
use crate::util::{fs, Config, ProjectContext};

/// Options shared by add/install/link.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// `--agent` selections; `None` falls back to the manifest default
    /// (all built-in agents).
    pub agents: Option<Vec<String>>,
}

/// One successfully installed skill.
#[derive(Debug, Clone)]
pub struct InstalledSkill {
    /// Identity key (manifest/lockfile map key).
    pub key: String,

    /// Link name for agents.
    pub name: String,

    /// Human-readable version (semver, 7-char commit, or `local`).
    pub version: String,

    /// Store path relative to the project root.
    pub store_path: PathBuf,

    /// Deprecation message to surface, if any.
    pub deprecated: Option<String>,
}

/// The outcome of an add/install run.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledSkill>,
    pub failures: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl InstallReport {
    /// Whether the command should exit zero.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A validated specifier, ready for plan execution.
enum ValidatedSpec {
    Registry {
        key: String,
        range: Option<String>,
    },
    GitHub {
        key: String,
        owner: String,
        repo: String,
        subpath: Option<String>,
        requested_ref: String,
        pinned: PinnedRef,
        bytes: Vec<u8>,
        integrity: Integrity,
    },
    Local {
        key: String,
        skill: LocalSkill,
    },
}

/// Drives the install pipeline for one project.
pub struct Installer<'a> {
    ctx: &'a ProjectContext,
    config: &'a Config,
    registry: RegistryClient,
    github: GitHubClient,
    cache: ContentCache,
}

impl<'a> Installer<'a> {
    /// Build an installer. Clients are constructed eagerly but no request
    /// is made until the pipeline needs one.
    pub fn new(ctx: &'a ProjectContext, config: &'a Config) -> Result<Self> {
        Ok(Installer {
            ctx,
            config,
            registry: RegistryClient::new(config)?,
            github: GitHubClient::new(config)?,
            cache: ContentCache::new(ctx.cache_dir()),
        })
    }

    /// `pspm add <specifiers...>`: validate, resolve, and install new
    /// dependencies, saving them to the manifest.
    pub fn add(&self, specifiers: &[String], options: &InstallOptions) -> Result<InstallReport> {
        if self.config.frozen_lockfile {
            bail!("cannot add dependencies with --frozen-lockfile");
        }

        let mut report = InstallReport::default();

        // Step 1: validate everything before any side effect.
        let mut validated = Vec::new();
        for raw in specifiers {
            match self.validate(raw) {
                Ok(spec) => validated.push(spec),
                Err(message) => report.failures.push((raw.clone(), message)),
            }
        }
        if validated.is_empty() {
            if report.failures.is_empty() {
                bail!("no specifiers given");
            }
            return Ok(report);
        }

        // Step 2: transitive resolution for the surviving registry roots.
        let mut roots = BTreeMap::new();
        for spec in &validated {
            if let ValidatedSpec::Registry { key, range } = spec {
                roots.insert(key.clone(), range.clone().unwrap_or_else(|| "*".into()));
            }
        }
        let resolution = self.resolve_registry(&roots)?;

        // Step 3: agent selection, deferred past validation.
        let mut manifest = Manifest::load(&self.ctx.manifest_path())?;
        let agents = select_agents(options, &manifest);

        // Step 4: execute in topological order, then GitHub, then local.
        let mut lockfile = self.load_or_new_lockfile()?;
        let direct_ranges: HashMap<String, Option<String>> = validated
            .iter()
            .filter_map(|s| match s {
                ValidatedSpec::Registry { key, range } => Some((key.clone(), range.clone())),
                _ => None,
            })
            .collect();

        self.execute_registry_plan(
            &resolution,
            &direct_ranges,
            &mut manifest,
            &mut lockfile,
            &agents,
            &mut report,
        )?;

        for spec in &validated {
            match spec {
                ValidatedSpec::Registry { .. } => {}
                ValidatedSpec::GitHub { .. } => {
                    self.install_github(spec, &mut manifest, &mut lockfile, &agents, &mut report)?;
                }
                ValidatedSpec::Local { .. } => {
                    self.install_local(spec, &mut manifest, &mut lockfile, &agents, &mut report)?;
                }
            }
        }

        Ok(report)
    }

    /// `pspm install`: reproduce the manifest's dependencies. In frozen
    /// mode the lockfile is authoritative and any gap is fatal.
    pub fn install(&self, options: &InstallOptions) -> Result<InstallReport> {
        let manifest = Manifest::load(&self.ctx.manifest_path())?;

        if self.config.frozen_lockfile {
            return self.install_frozen(&manifest, options);
        }

        let mut report = InstallReport::default();
        let resolution = self.resolve_registry(&manifest.dependencies)?;

        let agents = select_agents(options, &manifest);
        let mut lockfile = self.load_or_new_lockfile()?;
        let mut manifest = manifest;

        let direct_ranges: HashMap<String, Option<String>> = manifest
            .dependencies
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect();

        self.execute_registry_plan(
            &resolution,
            &direct_ranges,
            &mut manifest,
            &mut lockfile,
            &agents,
            &mut report,
        )?;

        // GitHub dependencies, reusing locked commits when the requested
        // ref is unchanged.
        let github_deps: Vec<(String, String)> = manifest
            .github_dependencies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, requested_ref) in github_deps {
            match self.validate_github_from_manifest(&key, &requested_ref, &lockfile) {
                Ok(spec) => {
                    self.install_github(&spec, &mut manifest, &mut lockfile, &agents, &mut report)?
                }
                Err(message) => report.failures.push((key, message)),
            }
        }

        // Local dependencies.
        let local_deps: Vec<String> = manifest.local_dependencies.keys().cloned().collect();
        for key in local_deps {
            let path = key.strip_prefix("file:").unwrap_or(&key).to_string();
            match LocalSkill::resolve(self.ctx.root(), &path) {
                Ok(skill) => {
                    let spec = ValidatedSpec::Local {
                        key: key.clone(),
                        skill,
                    };
                    self.install_local(&spec, &mut manifest, &mut lockfile, &agents, &mut report)?;
                }
                Err(err) => report.failures.push((key, err.to_string())),
            }
        }

        Ok(report)
    }

    /// Rebuild agent symlinks from the lockfile without installing.
    pub fn link(&self, options: &InstallOptions) -> Result<LinkReport> {
        let manifest = Manifest::load(&self.ctx.manifest_path())?;
        let lockfile = Lockfile::load(
            &self.ctx.lockfile_path(),
            &self.ctx.legacy_lockfile_path(),
        )?
        .unwrap_or_else(|| Lockfile::new(&self.config.registry_url));

        let agents = select_agents(options, &manifest);
        if agents.is_empty() {
            return Ok(LinkReport::default());
        }

        let requests = link_requests_from_lockfile(self.ctx, &lockfile);
        link_agents(self.ctx.root(), &requests, &agents, &manifest.agents)
    }

    // ---- validation -----------------------------------------------------

    /// Parse and shape-check one specifier; registry skills get a
    /// metadata lookup (no bytes), GitHub skills are downloaded to verify
    /// existence, local paths are stat'ed.
    fn validate(&self, raw: &str) -> std::result::Result<ValidatedSpec, String> {
        let spec = Specifier::parse(raw).map_err(|e| e.to_string())?;

        match spec {
            Specifier::Registry {
                ref username,
                ref name,
                ref range,
            } => {
                let versions = self
                    .registry
                    .list_versions(username, name)
                    .map_err(|e| describe_fetch_error(&e))?;
                let requested = range.clone().unwrap_or_else(|| "*".into());
                if crate::resolver::version::resolve(&requested, &versions).is_none() {
                    return Err(format!(
                        "no version of `{}` matches `{requested}` (available: {})",
                        spec.key(),
                        versions.join(", ")
                    ));
                }
                Ok(ValidatedSpec::Registry {
                    key: spec.key(),
                    range: range.clone(),
                })
            }

            Specifier::GitHub {
                owner,
                repo,
                path,
                reference,
            } => {
                let pinned = self
                    .github
                    .resolve_commit(&owner, &repo, reference.as_deref())
                    .map_err(|e| describe_fetch_error(&e))?;
                let bytes = self
                    .github
                    .download_tarball(&owner, &repo, &pinned.commit)
                    .map_err(|e| describe_fetch_error(&e))?;
                let integrity = Integrity::from_bytes(&bytes);
                let key = Specifier::GitHub {
                    owner: owner.clone(),
                    repo: repo.clone(),
                    path: path.clone(),
                    reference: None,
                }
                .key();
                Ok(ValidatedSpec::GitHub {
                    key,
                    owner,
                    repo,
                    subpath: path,
                    requested_ref: reference.unwrap_or_default(),
                    pinned,
                    bytes,
                    integrity,
                })
            }

            Specifier::Local { path } => {
                let skill = LocalSkill::resolve(self.ctx.root(), &path)
                    .map_err(|e| e.to_string())?;
                Ok(ValidatedSpec::Local {
                    key: format!("file:{path}"),
                    skill,
                })
            }
        }
    }

    /// Build a GitHub plan node for `install`, preferring the locked
    /// commit when the requested ref matches.
    fn validate_github_from_manifest(
        &self,
        key: &str,
        requested_ref: &str,
        lockfile: &Lockfile,
    ) -> std::result::Result<ValidatedSpec, String> {
        let parsed = Specifier::parse(key).map_err(|e| e.to_string())?;
        let Specifier::GitHub {
            owner,
            repo,
            path: subpath,
            ..
        } = parsed
        else {
            return Err(format!("`{key}` is not a github dependency"));
        };

        if let Some(entry) = lockfile.github_packages.get(key) {
            if entry.git_ref == requested_ref {
                let integrity = Integrity::parse(&entry.integrity).map_err(|e| e.to_string())?;
                let bytes = match self.cache.read(&integrity) {
                    Some(bytes) => bytes,
                    None => {
                        let bytes = self
                            .github
                            .download_tarball(&owner, &repo, &entry.git_commit)
                            .map_err(|e| describe_fetch_error(&e))?;
                        integrity.verify(&bytes).map_err(|e| e.to_string())?;
                        bytes
                    }
                };
                return Ok(ValidatedSpec::GitHub {
                    key: key.to_string(),
                    owner,
                    repo,
                    subpath,
                    requested_ref: requested_ref.to_string(),
                    pinned: PinnedRef {
                        commit: entry.git_commit.clone(),
                        reference: entry.git_ref.clone(),
                    },
                    bytes,
                    integrity,
                });
            }
        }

        let reference = if requested_ref.is_empty() {
            None
        } else {
            Some(requested_ref)
        };
        let pinned = self
            .github
            .resolve_commit(&owner, &repo, reference)
            .map_err(|e| describe_fetch_error(&e))?;
        let bytes = self
            .github
            .download_tarball(&owner, &repo, &pinned.commit)
            .map_err(|e| describe_fetch_error(&e))?;
        let integrity = Integrity::from_bytes(&bytes);
        Ok(ValidatedSpec::GitHub {
            key: key.to_string(),
            owner,
            repo,
            subpath,
            requested_ref: requested_ref.to_string(),
            pinned,
            bytes,
            integrity,
        })
    }

    // ---- resolution ------------------------------------------------------

    /// Run the resolver; any error or conflict terminates the run before
    /// side effects reach the filesystem.
    fn resolve_registry(&self, roots: &BTreeMap<String, String>) -> Result<Resolution> {
        let resolution =
            Resolver::new(&self.registry as &dyn RegistryMetadata, ResolverConfig::default())
                .resolve(roots);

        if !resolution.success() {
            let problems = resolution
                .conflicts
                .iter()
                .map(|c| c.to_diagnostic())
                .chain(resolution.errors.iter().map(|e| e.to_diagnostic()))
                .collect();
            return Err(ResolutionFailure { problems }.into());
        }
        Ok(resolution)
    }

    // ---- plan execution --------------------------------------------------

    /// Install every resolved registry node in topological order. The
    /// fetch phase runs in parallel across nodes; extraction, lockfile
    /// updates, and linking stay sequential in install order.
    fn execute_registry_plan(
        &self,
        resolution: &Resolution,
        direct_ranges: &HashMap<String, Option<String>>,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
        agents: &[String],
        report: &mut InstallReport,
    ) -> Result<()> {
        let ordered: Vec<_> = resolution
            .install_order
            .iter()
            .filter_map(|name| resolution.nodes.get(name))
            .collect();

        // Parallel prefetch: independent downloads with verification and
        // cache population.
        let mut prefetched: HashMap<String, std::result::Result<Vec<u8>, String>> = ordered
            .par_iter()
            .map(|node| {
                let result = self
                    .fetch_registry_bytes(&node.name, &node.download_url, &node.integrity)
                    .map_err(|e| describe_fetch_error(&e));
                (node.name.clone(), result)
            })
            .collect();

        for node in ordered {
            let bytes = match prefetched.remove(&node.name) {
                Some(Ok(bytes)) => bytes,
                Some(Err(message)) => {
                    report.failures.push((node.name.clone(), message));
                    continue;
                }
                None => continue,
            };

            let (username, skill_name) = match Specifier::parse(&node.name) {
                Ok(Specifier::Registry { username, name, .. }) => (username, name),
                _ => {
                    report
                        .failures
                        .push((node.name.clone(), "invalid registry identity".into()));
                    continue;
                }
            };
            let store_abs = self.ctx.registry_store_path(&username, &skill_name);

            if let Err(err) = extract_tarball(&node.name, &bytes, &store_abs, &Layout::StripRoot) {
                report.failures.push((node.name.clone(), format!("{err:#}")));
                continue;
            }

            lockfile.packages.insert(
                node.name.clone(),
                RegistryEntry {
                    version: node.version.to_string(),
                    resolved: node.download_url.clone(),
                    integrity: node.integrity.to_string_form(),
                    deprecated: node.deprecated.clone(),
                    dependencies: if node.dependencies.is_empty() {
                        None
                    } else {
                        Some(node.dependencies.clone())
                    },
                },
            );
            lockfile.registry_url = self.config.registry_url.clone();
            self.save_lockfile(lockfile)?;

            if node.is_direct {
                if let Some(range) = direct_ranges.get(&node.name) {
                    let saved_range = range
                        .clone()
                        .unwrap_or_else(|| format!("^{}", node.version));
                    manifest.add_dependency(&node.name, saved_range);
                    manifest.save(&self.ctx.manifest_path())?;
                }
            }

            if let Some(message) = &node.deprecated {
                let warning = format!("`{}@{}` is deprecated: {message}", node.name, node.version);
                tracing::warn!("{warning}");
                report.warnings.push(warning);
            }

            let store_rel = fs::relative_path(self.ctx.root(), &store_abs);
            self.link_one(&skill_name, &store_rel, agents, manifest, report)?;

            report.installed.push(InstalledSkill {
                key: node.name.clone(),
                name: skill_name,
                version: node.version.to_string(),
                store_path: store_rel,
                deprecated: node.deprecated.clone(),
            });
        }

        Ok(())
    }

    fn install_github(
        &self,
        spec: &ValidatedSpec,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
        agents: &[String],
        report: &mut InstallReport,
    ) -> Result<()> {
        let ValidatedSpec::GitHub {
            key,
            owner,
            repo,
            subpath,
            requested_ref,
            pinned,
            bytes,
            integrity,
        } = spec
        else {
            unreachable!("install_github called with a non-github spec");
        };

        self.cache.write(integrity, bytes)?;

        let store_abs = self
            .ctx
            .github_store_path(owner, repo, subpath.as_deref());
        let layout = Layout::GitHub {
            subpath: subpath.clone(),
        };
        if let Err(err) = extract_tarball(key, bytes, &store_abs, &layout) {
            report.failures.push((key.clone(), format!("{err:#}")));
            return Ok(());
        }

        lockfile.github_packages.insert(
            key.clone(),
            GitHubEntry {
                version: pinned.commit.chars().take(7).collect(),
                resolved: format!("https://github.com/{owner}/{repo}"),
                integrity: integrity.to_string_form(),
                git_commit: pinned.commit.clone(),
                git_ref: requested_ref.clone(),
            },
        );
        self.save_lockfile(lockfile)?;

        manifest.add_github_dependency(key, requested_ref.clone());
        manifest.save(&self.ctx.manifest_path())?;

        let name = match subpath {
            Some(p) => p.rsplit('/').next().unwrap_or(repo).to_string(),
            None => repo.clone(),
        };
        let store_rel = fs::relative_path(self.ctx.root(), &store_abs);
        self.link_one(&name, &store_rel, agents, manifest, report)?;

        report.installed.push(InstalledSkill {
            key: key.clone(),
            name,
            version: pinned.commit.chars().take(7).collect(),
            store_path: store_rel,
            deprecated: None,
        });
        Ok(())
    }

    fn install_local(
        &self,
        spec: &ValidatedSpec,
        manifest: &mut Manifest,
        lockfile: &mut Lockfile,
        agents: &[String],
        report: &mut InstallReport,
    ) -> Result<()> {
        let ValidatedSpec::Local { key, skill } = spec else {
            unreachable!("install_local called with a non-local spec");
        };

        self.place_local_store_symlink(skill)?;
        let store_abs = self.ctx.local_store_path(&skill.name);

        lockfile.local_packages.insert(
            key.clone(),
            LocalEntry {
                version: "local".to_string(),
                path: skill.path.clone(),
                resolved_path: skill.resolved_path.display().to_string(),
                name: skill.name.clone(),
            },
        );
        self.save_lockfile(lockfile)?;

        manifest.add_local_dependency(key);
        manifest.save(&self.ctx.manifest_path())?;

        let store_rel = fs::relative_path(self.ctx.root(), &store_abs);
        self.link_one(&skill.name, &store_rel, agents, manifest, report)?;

        report.installed.push(InstalledSkill {
            key: key.clone(),
            name: skill.name.clone(),
            version: "local".to_string(),
            store_path: store_rel,
            deprecated: None,
        });
        Ok(())
    }

    // ---- frozen mode -----------------------------------------------------

    /// `install --frozen-lockfile`: the lockfile is the plan. Any manifest
    /// entry absent from it, any cache miss the network cannot legally
    /// fill, and any integrity mismatch is fatal for the whole run.
    fn install_frozen(&self, manifest: &Manifest, options: &InstallOptions) -> Result<InstallReport> {
        let Some(lockfile) = Lockfile::load(
            &self.ctx.lockfile_path(),
            &self.ctx.legacy_lockfile_path(),
        )?
        else {
            bail!("--frozen-lockfile requires a lockfile\n{}", suggestions::STALE_LOCK);
        };

        for key in manifest.dependencies.keys() {
            if !lockfile.packages.contains_key(key) {
                bail!("`{key}` is not in the lockfile\n{}", suggestions::STALE_LOCK);
            }
        }
        for key in manifest.github_dependencies.keys() {
            if !lockfile.github_packages.contains_key(key) {
                bail!("`{key}` is not in the lockfile\n{}", suggestions::STALE_LOCK);
            }
        }
        for key in manifest.local_dependencies.keys() {
            if !lockfile.local_packages.contains_key(key) {
                bail!("`{key}` is not in the lockfile\n{}", suggestions::STALE_LOCK);
            }
        }

        let agents = select_agents(options, manifest);
        let mut report = InstallReport::default();

        for key in frozen_install_order(&lockfile) {
            let entry = &lockfile.packages[&key];
            let integrity = Integrity::parse(&entry.integrity)
                .with_context(|| format!("bad integrity in lockfile for `{key}`"))?;

            let bytes = match self.cache.read(&integrity) {
                Some(bytes) => bytes,
                None => {
                    // Network is only legal because the target is already
                    // pinned by resolved + integrity.
                    let bytes = self
                        .registry
                        .download(&key, &entry.resolved)
                        .map_err(|e| anyhow!("{}\n{}", describe_fetch_error(&e), suggestions::STALE_LOCK))?;
                    integrity
                        .verify(&bytes)
                        .with_context(|| format!("integrity verification failed for `{key}`"))?;
                    self.cache.write(&integrity, &bytes)?;
                    bytes
                }
            };

            let (username, skill_name) = match Specifier::parse(&key) {
                Ok(Specifier::Registry { username, name, .. }) => (username, name),
                _ => bail!("invalid registry identity in lockfile: `{key}`"),
            };
            let store_abs = self.ctx.registry_store_path(&username, &skill_name);
            extract_tarball(&key, &bytes, &store_abs, &Layout::StripRoot)?;

            let store_rel = fs::relative_path(self.ctx.root(), &store_abs);
            self.link_one(&skill_name, &store_rel, &agents, manifest, &mut report)?;

            report.installed.push(InstalledSkill {
                key: key.clone(),
                name: skill_name,
                version: entry.version.clone(),
                store_path: store_rel,
                deprecated: entry.deprecated.clone(),
            });
        }

        for (key, entry) in &lockfile.github_packages {
            let integrity = Integrity::parse(&entry.integrity)
                .with_context(|| format!("bad integrity in lockfile for `{key}`"))?;

            let parsed = Specifier::parse(key)
                .map_err(|e| anyhow!("invalid github identity in lockfile: {e}"))?;
            let Specifier::GitHub {
                owner,
                repo,
                path: subpath,
                ..
            } = parsed
            else {
                bail!("invalid github identity in lockfile: `{key}`");
            };

            // Cache first; the network is legal because the commit and
            // integrity are already pinned.
            let bytes = match self.cache.read(&integrity) {
                Some(bytes) => bytes,
                None => {
                    let bytes = self
                        .github
                        .download_tarball(&owner, &repo, &entry.git_commit)
                        .map_err(|e| {
                            anyhow!("{}\n{}", describe_fetch_error(&e), suggestions::STALE_LOCK)
                        })?;
                    integrity
                        .verify(&bytes)
                        .with_context(|| format!("integrity verification failed for `{key}`"))?;
                    self.cache.write(&integrity, &bytes)?;
                    bytes
                }
            };

            let store_abs = self.ctx.github_store_path(&owner, &repo, subpath.as_deref());
            let layout = Layout::GitHub {
                subpath: subpath.clone(),
            };
            extract_tarball(key, &bytes, &store_abs, &layout)?;

            let name = match &subpath {
                Some(p) => p.rsplit('/').next().unwrap_or(&repo).to_string(),
                None => repo.clone(),
            };
            let store_rel = fs::relative_path(self.ctx.root(), &store_abs);
            self.link_one(&name, &store_rel, &agents, manifest, &mut report)?;

            report.installed.push(InstalledSkill {
                key: key.clone(),
                name,
                version: entry.version.clone(),
                store_path: store_rel,
                deprecated: None,
            });
        }

        for (key, entry) in &lockfile.local_packages {
            let skill = LocalSkill::resolve(self.ctx.root(), &entry.path)
                .map_err(|e| anyhow!("{}", describe_fetch_error(&e)))?;

            self.place_local_store_symlink(&skill)?;
            let store_abs = self.ctx.local_store_path(&skill.name);
            let store_rel = fs::relative_path(self.ctx.root(), &store_abs);
            self.link_one(&skill.name, &store_rel, &agents, manifest, &mut report)?;

            report.installed.push(InstalledSkill {
                key: key.clone(),
                name: skill.name.clone(),
                version: "local".to_string(),
                store_path: store_rel,
                deprecated: None,
            });
        }

        Ok(report)
    }

    // ---- shared helpers --------------------------------------------------

    /// Cache-first tarball acquisition with verify-then-cache discipline.
    fn fetch_registry_bytes(
        &self,
        identity: &str,
        url: &str,
        integrity: &Integrity,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        if let Some(bytes) = self.cache.read(integrity) {
            tracing::debug!("cache hit for {identity}");
            return Ok(bytes);
        }

        let bytes = self.registry.download(identity, url)?;
        integrity
            .verify(&bytes)
            .map_err(|err| match err {
                crate::util::integrity::IntegrityError::Mismatch { expected, actual } => {
                    FetchError::IntegrityMismatch {
                        identity: identity.to_string(),
                        expected,
                        actual,
                    }
                }
                other => FetchError::Transport {
                    identity: identity.to_string(),
                    message: other.to_string(),
                },
            })?;

        if let Err(err) = self.cache.write(integrity, &bytes) {
            tracing::warn!("failed to cache {identity}: {err:#}");
        }
        Ok(bytes)
    }

    fn link_one(
        &self,
        name: &str,
        store_rel: &std::path::Path,
        agents: &[String],
        manifest: &Manifest,
        report: &mut InstallReport,
    ) -> Result<()> {
        if agents.is_empty() {
            return Ok(());
        }
        let request = LinkRequest {
            name: name.to_string(),
            store_path: store_rel.to_path_buf(),
        };
        let link_report = link_agents(self.ctx.root(), &[request], agents, &manifest.agents)?;
        report.warnings.extend(link_report.warnings);
        Ok(())
    }

    /// Create or repair `.pspm/skills/_local/<name>` as a relative symlink
    /// to the skill's real directory.
    fn place_local_store_symlink(&self, skill: &LocalSkill) -> Result<()> {
        let store_abs = self.ctx.local_store_path(&skill.name);
        let parent = store_abs
            .parent()
            .ok_or_else(|| anyhow!("store path has no parent: {}", store_abs.display()))?;
        fs::ensure_dir(parent)?;

        let target = fs::relative_path(parent, &skill.resolved_path);
        match fs::read_link_if_symlink(&store_abs) {
            Some(existing) if existing == target => Ok(()),
            Some(_) => {
                std::fs::remove_file(&store_abs)?;
                fs::symlink(&target, &store_abs)?;
                Ok(())
            }
            None if fs::entry_exists(&store_abs) => {
                fs::remove_dir_all_if_exists(&store_abs)?;
                fs::symlink(&target, &store_abs)?;
                Ok(())
            }
            None => {
                fs::symlink(&target, &store_abs)?;
                Ok(())
            }
        }
    }

    fn load_or_new_lockfile(&self) -> Result<Lockfile> {
        Ok(Lockfile::load(
            &self.ctx.lockfile_path(),
            &self.ctx.legacy_lockfile_path(),
        )?
        .unwrap_or_else(|| Lockfile::new(&self.config.registry_url)))
    }

    fn save_lockfile(&self, lockfile: &Lockfile) -> Result<()> {
        lockfile.save(&self.ctx.lockfile_path(), &self.ctx.legacy_lockfile_path())
    }
}

/// Agent selection: `--agent` wins, then the manifest default (all
/// built-ins), then all built-ins for headless runs. `none` suppresses
/// linking; as the sole selection it empties the list entirely.
fn select_agents(options: &InstallOptions, _manifest: &Manifest) -> Vec<String> {
    let selected = match &options.agents {
        Some(agents) => agents.clone(),
        None => built_in_agent_names(),
    };
    selected
        .into_iter()
        .filter(|name| name != AGENT_NONE)
        .collect()
}

/// Order frozen installs from the lockfile's own dependency maps,
/// dependencies first, without a network round-trip.
fn frozen_install_order(lockfile: &Lockfile) -> Vec<String> {
    // A package's indegree is its number of in-graph dependencies.
    let mut indegree: BTreeMap<&str, usize> = lockfile
        .packages
        .iter()
        .map(|(key, entry)| {
            let count = entry
                .dependencies
                .as_ref()
                .map(|deps| {
                    deps.keys()
                        .filter(|d| lockfile.packages.contains_key(*d))
                        .count()
                })
                .unwrap_or(0);
            (key.as_str(), count)
        })
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(lockfile.packages.len());
    let mut remaining: Vec<&str> = lockfile.packages.keys().map(|k| k.as_str()).collect();

    while !remaining.is_empty() {
        let Some(pos) = remaining.iter().position(|k| indegree[k] == 0) else {
            // a cycle in lockfile data; emit the rest in key order
            order.extend(remaining.iter().map(|k| k.to_string()));
            break;
        };
        let key = remaining.remove(pos);
        order.push(key.to_string());
        for (other, entry) in &lockfile.packages {
            if let Some(deps) = &entry.dependencies {
                if deps.contains_key(key) {
                    if let Some(count) = indegree.get_mut(other.as_str()) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
    }

    order
}

/// Build link requests for everything the lockfile describes.
fn link_requests_from_lockfile(ctx: &ProjectContext, lockfile: &Lockfile) -> Vec<LinkRequest> {
    let mut requests = Vec::new();

    for key in lockfile.packages.keys() {
        if let Ok(Specifier::Registry { username, name, .. }) = Specifier::parse(key) {
            let store = ctx.registry_store_path(&username, &name);
            requests.push(LinkRequest {
                name,
                store_path: fs::relative_path(ctx.root(), &store),
            });
        }
    }
    for key in lockfile.github_packages.keys() {
        if let Ok(Specifier::GitHub {
            owner, repo, path, ..
        }) = Specifier::parse(key)
        {
            let store = ctx.github_store_path(&owner, &repo, path.as_deref());
            let name = match &path {
                Some(p) => p.rsplit('/').next().unwrap_or(&repo).to_string(),
                None => repo,
            };
            requests.push(LinkRequest {
                name,
                store_path: fs::relative_path(ctx.root(), &store),
            });
        }
    }
    for entry in lockfile.local_packages.values() {
        let store = ctx.local_store_path(&entry.name);
        requests.push(LinkRequest {
            name: entry.name.clone(),
            store_path: fs::relative_path(ctx.root(), &store),
        });
    }

    requests
}

fn describe_fetch_error(err: &FetchError) -> String {
    match err {
        FetchError::AuthRequired { .. } => format!("{err}\n{}", suggestions::LOGIN_NEEDED),
        FetchError::RateLimited { .. } => format!("{err}\n{}", suggestions::SET_GITHUB_TOKEN),
        FetchError::Timeout { .. } | FetchError::Transport { .. } => {
            format!("{err}\n{}", suggestions::FETCH_FAILED)
        }
        _ => err.to_string(),
    }
}
