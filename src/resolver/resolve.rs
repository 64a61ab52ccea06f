//! The two-phase BFS resolver.
//!
//! Phase 1 walks the registry graph breadth-first, collecting every
//! `{range, dependent, depth}` requirement and building a provisional node
//! per package. Phase 2 re-selects each package's version against the full
//! requirement set and refreshes metadata when the pick changed. Phase 3
//! orders the surviving graph topologically (dependencies first) with
//! insertion-order determinism.

use std::collections::{BTreeMap, HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use semver::Version;

use crate::core::Specifier;
use crate::resolver::errors::{RangeWitness, ResolveError, VersionConflict};
use crate::resolver::version as semver_engine;
use crate::sources::registry::RegistryMetadata;
use crate::sources::FetchError;
use crate::util::integrity::Integrity;

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum dependency chain depth before a chain is rejected.
    pub max_depth: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig { max_depth: 5 }
    }
}

/// A fully resolved registry skill.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// Identity, `@user/<username>/<name>`.
    pub name: String,

    /// Selected version.
    pub version: Version,

    /// Tarball URL for this version.
    pub download_url: String,

    /// Expected tarball integrity, derived from the registry checksum.
    pub integrity: Integrity,

    /// Immediate registry dependencies: identity -> range.
    pub dependencies: BTreeMap<String, String>,

    /// Depth of first discovery (0 for roots).
    pub depth: u32,

    /// Packages that require this one (`"root"` for direct deps).
    pub dependents: Vec<String>,

    /// Whether this is a direct dependency of the project.
    pub is_direct: bool,

    /// Deprecation message carried from the registry, if any.
    pub deprecated: Option<String>,
}

/// The outcome of a resolver run.
#[derive(Debug)]
pub struct Resolution {
    /// Every node discovered, including stale nodes kept for reporting.
    pub nodes: HashMap<String, ResolvedNode>,

    /// The direct dependencies that seeded the walk.
    pub roots: Vec<String>,

    /// Collected non-conflict diagnostics.
    pub errors: Vec<ResolveError>,

    /// Jointly-unsatisfiable requirement sets.
    pub conflicts: Vec<VersionConflict>,

    /// Install order, dependencies before dependents.
    pub install_order: Vec<String>,
}

impl Resolution {
    /// True when nothing went wrong.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.conflicts.is_empty()
    }
}

struct QueueEntry {
    name: String,
    range: String,
    depth: u32,
    dependent: String,
    path: Vec<String>,
}

struct CollectedRange {
    witness: RangeWitness,
    #[allow(dead_code)]
    depth: u32,
}

/// The resolver itself. Generic over the metadata source so tests can run
/// against an in-memory registry.
pub struct Resolver<'a> {
    registry: &'a dyn RegistryMetadata,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a metadata source.
    pub fn new(registry: &'a dyn RegistryMetadata, config: ResolverConfig) -> Self {
        Resolver { registry, config }
    }

    /// Resolve a set of root dependencies (`identity -> range`).
    pub fn resolve(&self, roots: &BTreeMap<String, String>) -> Resolution {
        let mut state = State::default();

        let mut queue: VecDeque<QueueEntry> = roots
            .iter()
            .map(|(name, range)| QueueEntry {
                name: name.clone(),
                range: range.clone(),
                depth: 0,
                dependent: "root".to_string(),
                path: Vec::new(),
            })
            .collect();

        // Phase 1: BFS collection.
        while let Some(entry) = queue.pop_front() {
            if entry.depth > self.config.max_depth {
                let mut path = entry.path.clone();
                path.push(entry.name.clone());
                state.errors.push(ResolveError::MaxDepthExceeded {
                    path,
                    max_depth: self.config.max_depth,
                });
                continue;
            }

            if entry.path.contains(&entry.name) {
                let mut path = entry.path.clone();
                path.push(entry.name.clone());
                state.errors.push(ResolveError::CircularDependency { path });
                continue;
            }

            state.collect_range(&entry);

            if state.nodes.contains_key(&entry.name) {
                // Ranges still collected above; the node is already built.
                continue;
            }

            let Some((username, skill)) = split_identity(&entry.name) else {
                state.errors.push(ResolveError::FetchError {
                    package: entry.name.clone(),
                    message: "not a registry identity".to_string(),
                });
                continue;
            };

            let versions = match self.registry.list_versions(&username, &skill) {
                Ok(v) => v,
                Err(FetchError::NotFound { .. }) => {
                    state.errors.push(ResolveError::PackageNotFound {
                        package: entry.name.clone(),
                    });
                    continue;
                }
                Err(err) => {
                    state.errors.push(ResolveError::FetchError {
                        package: entry.name.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let provisional = match semver_engine::resolve(&entry.range, &versions) {
                Some(v) => v,
                None => {
                    state.versions.insert(entry.name.clone(), versions);
                    state.errors.push(ResolveError::NoSatisfyingVersion {
                        package: entry.name.clone(),
                        ranges: vec![entry.range.clone()],
                        available: state.versions[&entry.name].clone(),
                    });
                    continue;
                }
            };

            let metadata = match self
                .registry
                .get_version(&username, &skill, &provisional.to_string())
            {
                Ok(m) => m,
                Err(err) => {
                    state.errors.push(ResolveError::FetchError {
                        package: entry.name.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let integrity = match Integrity::from_hex_checksum(&metadata.checksum) {
                Ok(i) => i,
                Err(err) => {
                    state.errors.push(ResolveError::FetchError {
                        package: entry.name.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let mut child_path = entry.path.clone();
            child_path.push(entry.name.clone());
            for (dep_name, dep_range) in &metadata.manifest.dependencies {
                queue.push_back(QueueEntry {
                    name: dep_name.clone(),
                    range: dep_range.clone(),
                    depth: entry.depth + 1,
                    dependent: entry.name.clone(),
                    path: child_path.clone(),
                });
            }

            state.versions.insert(entry.name.clone(), versions);
            state.nodes.insert(
                entry.name.clone(),
                ResolvedNode {
                    name: entry.name.clone(),
                    version: provisional,
                    download_url: metadata.download_url,
                    integrity,
                    dependencies: metadata.manifest.dependencies,
                    depth: entry.depth,
                    dependents: Vec::new(),
                    is_direct: false,
                    deprecated: metadata.deprecation_message,
                },
            );
        }

        // Phase 2: multi-range finalisation.
        for name in state.range_order.clone() {
            self.finalise(&name, &mut state);
        }

        // Dependents and is_direct derive from the collected witnesses.
        for name in &state.range_order {
            if let Some(node) = state.nodes.get_mut(name) {
                let witnesses = &state.ranges[name];
                node.is_direct = witnesses.iter().any(|c| c.witness.dependent == "root");
                node.dependents = witnesses
                    .iter()
                    .map(|c| c.witness.dependent.clone())
                    .filter(|d| d != "root")
                    .collect();
                node.dependents.dedup();
            }
        }

        // Phase 3: topological sort.
        let install_order = topological_order(&state);

        Resolution {
            nodes: state.nodes,
            roots: roots.keys().cloned().collect(),
            errors: state.errors,
            conflicts: state.conflicts,
            install_order,
        }
    }

    fn finalise(&self, name: &str, state: &mut State) {
        let Some(versions) = state.versions.get(name).cloned() else {
            return; // listing failed in phase 1, already reported
        };
        let Some(node) = state.nodes.get(name) else {
            return;
        };

        let ranges: Vec<String> = state.ranges[name]
            .iter()
            .map(|c| c.witness.range.clone())
            .collect();

        let Some(final_version) = semver_engine::find_highest_satisfying(&ranges, &versions)
        else {
            // Keep the stale node so reporting can list everything wrong.
            state.conflicts.push(VersionConflict {
                package: name.to_string(),
                ranges: state.ranges[name].iter().map(|c| c.witness.clone()).collect(),
                available_versions: versions.clone(),
            });
            state.errors.push(ResolveError::NoSatisfyingVersion {
                package: name.to_string(),
                ranges,
                available: versions,
            });
            return;
        };

        if final_version == node.version {
            return;
        }

        tracing::debug!(
            "re-selecting {name}: {} -> {final_version} after multi-range intersection",
            node.version
        );

        let Some((username, skill)) = split_identity(name) else {
            return;
        };
        match self
            .registry
            .get_version(&username, &skill, &final_version.to_string())
        {
            Ok(metadata) => {
                let integrity = match Integrity::from_hex_checksum(&metadata.checksum) {
                    Ok(i) => i,
                    Err(err) => {
                        state.errors.push(ResolveError::FetchError {
                            package: name.to_string(),
                            message: err.to_string(),
                        });
                        return;
                    }
                };
                // Unwrap is safe: the node was checked at the top of finalise.
                let node = state.nodes.get_mut(name).unwrap();
                node.version = final_version;
                node.download_url = metadata.download_url;
                node.integrity = integrity;
                node.dependencies = metadata.manifest.dependencies;
                node.deprecated = metadata.deprecation_message;
                // Transitive deps introduced only by the old version stay
                // queued from phase 1; their ranges remain valid inputs.
            }
            Err(err) => {
                state.errors.push(ResolveError::FetchError {
                    package: name.to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
}

#[derive(Default)]
struct State {
    ranges: HashMap<String, Vec<CollectedRange>>,
    range_order: Vec<String>,
    nodes: HashMap<String, ResolvedNode>,
    versions: HashMap<String, Vec<String>>,
    errors: Vec<ResolveError>,
    conflicts: Vec<VersionConflict>,
}

impl State {
    fn collect_range(&mut self, entry: &QueueEntry) {
        if !self.ranges.contains_key(&entry.name) {
            self.range_order.push(entry.name.clone());
        }
        self.ranges
            .entry(entry.name.clone())
            .or_default()
            .push(CollectedRange {
                witness: RangeWitness {
                    dependent: entry.dependent.clone(),
                    range: entry.range.clone(),
                },
                depth: entry.depth,
            });
    }
}

/// Kahn's algorithm over the nodes present in the graph. Edges pointing at
/// absent dependencies are ignored. Ready nodes are taken in insertion
/// order so repeated runs produce identical output.
fn topological_order(state: &State) -> Vec<String> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for name in &state.range_order {
        if state.nodes.contains_key(name) {
            let idx = graph.add_node(name.clone());
            indices.insert(name.as_str(), idx);
        }
    }

    // Edge dependency -> dependent: dependencies must come out first.
    for (name, node) in &state.nodes {
        let Some(&to) = indices.get(name.as_str()) else {
            continue;
        };
        for dep in node.dependencies.keys() {
            if let Some(&from) = indices.get(dep.as_str()) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut indegree: HashMap<NodeIndex, usize> = indices
        .values()
        .map(|&idx| {
            (
                idx,
                graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .count(),
            )
        })
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    let mut emitted: Vec<bool> = vec![false; graph.node_count()];

    loop {
        // Lowest node index first; node indices follow insertion order.
        let Some(next) = graph
            .node_indices()
            .find(|idx| !emitted[idx.index()] && indegree[idx] == 0)
        else {
            break;
        };
        emitted[next.index()] = true;
        order.push(graph[next].clone());
        for succ in graph.neighbors(next) {
            *indegree.get_mut(&succ).unwrap() -= 1;
        }
    }

    // Nodes on a recorded cycle never reach indegree zero; append them so
    // the order still names every node.
    for idx in graph.node_indices() {
        if !emitted[idx.index()] {
            order.push(graph[idx].clone());
        }
    }

    order
}

/// Split `@user/<username>/<name>` into its parts.
fn split_identity(identity: &str) -> Option<(String, String)> {
    match Specifier::parse(identity) {
        Ok(Specifier::Registry { username, name, .. }) => Some((username, name)),
        _ => None,
    }
}
