//! Duplicate package detection.
//!
//! A package is a duplicate when the tree holds more than one instance of it:
//! either several versions (a version conflict) or the same version reached
//! through several ancestor chains. For every reported instance the chain of
//! ancestors that pulled it in is reconstructed with versions.

use crate::tree::{DependencyTree, NodeId};
use crate::types::Hierarchy;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Chains longer than this are elided when displayed.
pub const DEFAULT_MAX_CHAIN_HOPS: usize = 8;

/// Hops kept at each end of an elided chain.
const ELIDED_CHAIN_KEEP: usize = 3;

/// One ancestor in a reconstructed chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    /// Ancestor name.
    pub name: String,
    /// Ancestor version, `"unknown"` when no instance of it was indexed.
    pub version: String,
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Where a duplicate instance is installed, as far as the lockfile says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum InstallLocation {
    /// Concrete `node_modules` path.
    Path(String),
    /// Content-addressed store shared by all dependents.
    Store,
    /// Location not recorded; declared by the root.
    Root,
    /// Location not recorded; pulled in by another package.
    Transitive,
}

impl fmt::Display for InstallLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallLocation::Path(path) => f.write_str(path),
            InstallLocation::Store => f.write_str("(store)"),
            InstallLocation::Root => f.write_str("(root)"),
            InstallLocation::Transitive => f.write_str("(transitive)"),
        }
    }
}

/// One reported instance of a duplicated package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateInstance {
    /// Node this instance was taken from.
    pub node: NodeId,
    /// Package name.
    pub name: String,
    /// Name the instance was declared under, when aliased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Resolved version.
    pub version: String,
    /// Tree depth.
    pub depth: usize,
    /// Ancestor names.
    pub path: Vec<String>,
    /// Reached only through development dependencies.
    pub is_dev_dependency: bool,
    /// Install location knowledge from the lock entry.
    pub hierarchy: Hierarchy,
    /// Ancestors with their versions, root side first.
    pub chain: Vec<ChainLink>,
}

impl DuplicateInstance {
    /// Install location. Lockfiles that record no locations yield
    /// [`InstallLocation::Root`] or [`InstallLocation::Transitive`] rather
    /// than a guessed path.
    pub fn install_location(&self) -> InstallLocation {
        match &self.hierarchy {
            Hierarchy::Nested(parents) => InstallLocation::Path(
                parents
                    .iter()
                    .chain(std::iter::once(self.alias.as_ref().unwrap_or(&self.name)))
                    .map(|segment| format!("node_modules/{}", segment))
                    .collect::<Vec<_>>()
                    .join("/"),
            ),
            Hierarchy::Flat => InstallLocation::Store,
            Hierarchy::Unknown if self.depth <= 1 => InstallLocation::Root,
            Hierarchy::Unknown => InstallLocation::Transitive,
        }
    }
}

/// All reported instances of one package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Package name.
    pub name: String,
    /// Distinct versions among the instances, in first-seen order.
    pub versions: Vec<String>,
    /// Reported instances in tree index order.
    pub instances: Vec<DuplicateInstance>,
}

impl DuplicateGroup {
    /// True when the instances disagree on version.
    pub fn has_version_conflict(&self) -> bool {
        self.versions.len() > 1
    }
}

/// Result of duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DuplicateSummary {
    /// Distinct `name@version` keys in the tree.
    pub total_packages: usize,
    /// Number of duplicate groups.
    pub duplicate_packages: usize,
    /// Instances across all groups.
    pub total_duplicate_instances: usize,
    /// Groups, most instances first.
    pub duplicates: Vec<DuplicateGroup>,
}

impl DuplicateSummary {
    /// Keeps only the groups matching `keep` and recomputes the counts.
    pub fn retain(&mut self, keep: impl FnMut(&DuplicateGroup) -> bool) {
        self.duplicates.retain(keep);
        self.duplicate_packages = self.duplicates.len();
        self.total_duplicate_instances = self.duplicates.iter().map(|g| g.instances.len()).sum();
    }

    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty()
    }
}

/// Finds duplicated packages in a [`DependencyTree`].
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    version_conflicts_only: bool,
}

impl DuplicateDetector {
    /// Reports same-version duplicates as well as version conflicts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the report to packages present in at least two versions.
    pub fn version_conflicts_only(mut self, enabled: bool) -> Self {
        self.version_conflicts_only = enabled;
        self
    }

    /// Runs detection. Does not modify the tree; repeated calls give equal
    /// summaries.
    pub fn detect(&self, tree: &DependencyTree) -> DuplicateSummary {
        let by_name = instances_by_name(tree);

        let mut duplicates = Vec::new();
        for (name, ids) in &by_name.groups {
            if ids.len() < 2 {
                continue;
            }
            let included = self.qualifying(tree, ids);
            if included.len() < 2 {
                continue;
            }

            let mut versions: Vec<String> = Vec::new();
            let mut instances = Vec::with_capacity(included.len());
            for id in included {
                let node = tree.node(id);
                if !versions.contains(&node.version) {
                    versions.push(node.version.clone());
                }
                instances.push(DuplicateInstance {
                    node: id,
                    name: node.name.clone(),
                    alias: node.alias.clone(),
                    version: node.version.clone(),
                    depth: node.depth,
                    path: node.path.clone(),
                    is_dev_dependency: node.is_dev_dependency,
                    hierarchy: node.hierarchy.clone(),
                    chain: reconstruct_chain(tree, &by_name, &node.path),
                });
            }
            duplicates.push(DuplicateGroup {
                name: name.clone(),
                versions,
                instances,
            });
        }

        // Stable: ties keep index order.
        duplicates.sort_by(|a, b| b.instances.len().cmp(&a.instances.len()));

        let total_duplicate_instances = duplicates.iter().map(|g| g.instances.len()).sum();
        tracing::debug!(
            groups = duplicates.len(),
            instances = total_duplicate_instances,
            "duplicate detection finished"
        );
        DuplicateSummary {
            total_packages: tree.package_count(),
            duplicate_packages: duplicates.len(),
            total_duplicate_instances,
            duplicates,
        }
    }

    /// Applies the reporting policy to all instances of one name.
    fn qualifying(&self, tree: &DependencyTree, ids: &[NodeId]) -> Vec<NodeId> {
        let mut by_version: Vec<(&str, Vec<NodeId>)> = Vec::new();
        for &id in ids {
            let version = tree.node(id).version.as_str();
            match by_version.iter_mut().find(|(v, _)| *v == version) {
                Some((_, members)) => members.push(id),
                None => by_version.push((version, vec![id])),
            }
        }

        if by_version.len() >= 2 {
            return ids.to_vec();
        }
        if self.version_conflicts_only {
            return Vec::new();
        }
        by_version
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .flat_map(|(_, members)| members)
            .collect()
    }
}

/// Instances grouped by bare package name, in index order, plus an index by
/// declared name for resolving ancestor paths.
struct InstancesByName {
    groups: Vec<(String, Vec<NodeId>)>,
    declared: HashMap<String, Vec<NodeId>>,
}

impl InstancesByName {
    /// Instances declared as `name` (the alias for aliased packages).
    fn declared_as(&self, name: &str) -> &[NodeId] {
        self.declared.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn instances_by_name(tree: &DependencyTree) -> InstancesByName {
    let mut groups: Vec<(String, Vec<NodeId>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut declared: HashMap<String, Vec<NodeId>> = HashMap::new();
    let mut seen: HashSet<(&str, &str, &[String])> = HashSet::new();

    for (_key, ids) in tree.all_nodes() {
        for &id in ids {
            let node = tree.node(id);
            if !seen.insert((&node.name, &node.version, &node.path)) {
                continue;
            }
            let pos = *positions.entry(node.name.clone()).or_insert_with(|| {
                groups.push((node.name.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[pos].1.push(id);
            declared.entry(node.lookup_name().to_string()).or_default().push(id);
        }
    }

    InstancesByName { groups, declared }
}

/// Resolves each ancestor in `path` to a version.
///
/// The ancestor at position `i` is looked up among instances declared under
/// that name whose own path equals `path[..i]`, which tells apart the same ancestor
/// name installed at different versions in different branches.
fn reconstruct_chain(
    tree: &DependencyTree,
    by_name: &InstancesByName,
    path: &[String],
) -> Vec<ChainLink> {
    path.iter()
        .enumerate()
        .map(|(i, ancestor)| {
            let candidates = by_name.declared_as(ancestor);
            let version = candidates
                .iter()
                .map(|&id| tree.node(id))
                .find(|node| node.path.as_slice() == &path[..i])
                .or_else(|| candidates.first().map(|&id| tree.node(id)))
                .map(|node| node.version.clone())
                .unwrap_or_else(|| "unknown".to_string());
            ChainLink {
                name: ancestor.clone(),
                version,
            }
        })
        .collect()
}

/// A piece of a displayed chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSegment<'c> {
    /// A visible hop.
    Link(&'c ChainLink),
    /// Marker standing in for this many hidden hops.
    Elided(usize),
}

/// Display policy for long ancestor chains.
///
/// Chains over `max_hops` keep their first and last three hops with an
/// elision marker in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDisplay {
    max_hops: usize,
}

impl Default for ChainDisplay {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_CHAIN_HOPS,
        }
    }
}

impl ChainDisplay {
    /// Policy eliding chains longer than `max_hops`. Values below six are
    /// raised to six so the kept ends never overlap.
    pub fn new(max_hops: usize) -> Self {
        Self {
            max_hops: max_hops.max(ELIDED_CHAIN_KEEP * 2),
        }
    }

    /// Splits `chain` into visible hops and at most one elision marker.
    pub fn segments<'c>(&self, chain: &'c [ChainLink]) -> Vec<ChainSegment<'c>> {
        if chain.len() <= self.max_hops {
            return chain.iter().map(ChainSegment::Link).collect();
        }
        let hidden = chain.len() - ELIDED_CHAIN_KEEP * 2;
        chain[..ELIDED_CHAIN_KEEP]
            .iter()
            .map(ChainSegment::Link)
            .chain(std::iter::once(ChainSegment::Elided(hidden)))
            .chain(chain[chain.len() - ELIDED_CHAIN_KEEP..].iter().map(ChainSegment::Link))
            .collect()
    }

    /// Renders `chain` joined by `separator`.
    pub fn render(&self, chain: &[ChainLink], separator: &str) -> String {
        self.segments(chain)
            .iter()
            .map(|segment| match segment {
                ChainSegment::Link(link) => link.to_string(),
                ChainSegment::Elided(hidden) => format!("... {} more ...", hidden),
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}
