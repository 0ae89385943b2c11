//! Dependency tree construction.
//!
//! The tree mirrors what the package manager resolved: every path from the
//! root to a package becomes its own node, so a package pulled in by two
//! parents appears twice. Two guards keep the walk finite:
//!
//! - a package is never expanded below itself (ancestor check)
//! - nothing is expanded past `max_depth`
//!
//! Nodes live in an arena owned by [`DependencyTree`]; `children` lists and the
//! `name@version` index both refer to them by [`NodeId`].

use crate::error::{Error, Result};
use crate::normalizer::{LockfileNormalizer, LookupContext};
use crate::types::{
    composite_key, Hierarchy, Importer, LockEntry, LockFormat, NormalizedLockData,
    RootDependencies,
};
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// Depth bound used when callers do not pick one.
///
/// Every distinct ancestor chain gets its own node, so on densely connected
/// graphs the node count grows exponentially with depth before the bound
/// cuts it off. Lower it (`--max-depth`, `max_depth` in the config file) for
/// large monorepos; the ancestor check alone does not keep such trees small.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Name given to the synthetic root when the manifest has none.
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Handle to a node inside a [`DependencyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena position.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One package instance in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyTreeNode {
    /// Package name.
    pub name: String,
    /// Name the parent declared this dependency under, when it differs from
    /// the package name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Resolved version.
    pub version: String,
    /// Distance from the root (root is 0).
    pub depth: usize,
    /// Ancestor names from the root, excluding the root and this node. Each
    /// ancestor appears under the name it was declared as, so an aliased
    /// ancestor contributes its alias.
    pub path: Vec<String>,
    /// Declared directly by the root.
    pub is_direct: bool,
    /// Reached only through a development dependency of the root.
    pub is_dev_dependency: bool,
    /// Resolution URL from the lock entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    /// Integrity hash from the lock entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    /// Raw key of the lock entry this node was built from (none for the root).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_key: Option<String>,
    /// Install location knowledge copied from the lock entry.
    pub hierarchy: Hierarchy,
    /// Child nodes in lockfile edge order.
    #[serde(skip)]
    pub children: Vec<NodeId>,
}

impl DependencyTreeNode {
    /// Composite `name@version` key.
    pub fn composite_key(&self) -> String {
        composite_key(&self.name, &self.version)
    }

    /// Name this node was declared as: the alias when there is one.
    pub fn lookup_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn from_entry(entry: &LockEntry, declared: &str, path: Vec<String>, is_dev: bool) -> Self {
        let depth = path.len() + 1;
        Self {
            name: entry.name.clone(),
            alias: (declared != entry.name).then(|| declared.to_string()),
            version: entry.version.clone(),
            depth,
            path,
            is_direct: depth == 1,
            is_dev_dependency: is_dev,
            resolved_url: entry.resolved_url.clone(),
            integrity: entry.integrity.clone(),
            lock_key: Some(entry.raw_key.clone()),
            hierarchy: entry.hierarchy.clone(),
            children: Vec::new(),
        }
    }
}

/// A declared dependency that had no matching lock entry. Its branch is
/// omitted from the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    /// Dependency name.
    pub name: String,
    /// Range that could not be matched.
    pub range: String,
    /// Ancestor names at the point of the lookup.
    pub path: Vec<String>,
}

/// The resolved dependency tree plus a `name@version` index over its nodes.
#[derive(Debug, Clone)]
pub struct DependencyTree {
    format: LockFormat,
    nodes: Vec<DependencyTreeNode>,
    all_nodes: Vec<(String, Vec<NodeId>)>,
    key_positions: HashMap<String, usize>,
    unresolved: Vec<UnresolvedDependency>,
}

impl DependencyTree {
    fn new(format: LockFormat, root_name: &str, root_version: &str) -> Self {
        let root = DependencyTreeNode {
            name: root_name.to_string(),
            alias: None,
            version: root_version.to_string(),
            depth: 0,
            path: Vec::new(),
            is_direct: false,
            is_dev_dependency: false,
            resolved_url: None,
            integrity: None,
            lock_key: None,
            hierarchy: Hierarchy::top_level(),
            children: Vec::new(),
        };
        Self {
            format,
            nodes: vec![root],
            all_nodes: Vec::new(),
            key_positions: HashMap::new(),
            unresolved: Vec::new(),
        }
    }

    /// Format of the lock data the tree was built from.
    pub fn format(&self) -> LockFormat {
        self.format
    }

    /// Handle of the synthetic root.
    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    /// The synthetic root node.
    pub fn root(&self) -> &DependencyTreeNode {
        &self.nodes[0]
    }

    /// Node by handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different tree.
    pub fn node(&self, id: NodeId) -> &DependencyTreeNode {
        &self.nodes[id.0]
    }

    /// Children of `id` in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &DependencyTreeNode)> {
        self.nodes[id.0]
            .children
            .iter()
            .map(move |&child| (child, &self.nodes[child.0]))
    }

    /// The `name@version` index in insertion order.
    pub fn all_nodes(&self) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.all_nodes
            .iter()
            .map(|(key, ids)| (key.as_str(), ids.as_slice()))
    }

    /// Instances indexed under `key`.
    pub fn instances(&self, key: &str) -> &[NodeId] {
        self.key_positions
            .get(key)
            .map(|&i| self.all_nodes[i].1.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct `name@version` keys.
    pub fn package_count(&self) -> usize {
        self.all_nodes.len()
    }

    /// Number of nodes excluding the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Dependencies that were pruned because no lock entry matched.
    pub fn unresolved(&self) -> &[UnresolvedDependency] {
        &self.unresolved
    }

    /// Depth-first, pre-order walk of every node below the root.
    pub fn walk(&self) -> Walk<'_> {
        let mut stack: Vec<NodeId> = self.root().children.clone();
        stack.reverse();
        Walk { tree: self, stack }
    }

    fn push(&mut self, node: DependencyTreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let key = node.composite_key();
        self.nodes.push(node);
        match self.key_positions.get(&key) {
            Some(&pos) => self.all_nodes[pos].1.push(id),
            None => {
                self.key_positions.insert(key.clone(), self.all_nodes.len());
                self.all_nodes.push((key, vec![id]));
            }
        }
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }
}

/// Iterator returned by [`DependencyTree::walk`].
pub struct Walk<'t> {
    tree: &'t DependencyTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Walk<'t> {
    type Item = (NodeId, &'t DependencyTreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev().copied());
        Some((id, node))
    }
}

/// Serializes as a nested document rooted at the synthetic root.
impl Serialize for DependencyTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DependencyTree", 5)?;
        state.serialize_field("format", &self.format)?;
        state.serialize_field("total_packages", &self.package_count())?;
        state.serialize_field("total_nodes", &self.node_count())?;
        state.serialize_field(
            "root",
            &NestedNode {
                tree: self,
                id: self.root_id(),
            },
        )?;
        state.serialize_field("unresolved", &self.unresolved)?;
        state.end()
    }
}

struct NestedNode<'t> {
    tree: &'t DependencyTree,
    id: NodeId,
}

impl Serialize for NestedNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let mut state = serializer.serialize_struct("DependencyTreeNode", 2)?;
        state.serialize_field("node", node)?;
        state.serialize_field(
            "children",
            &NestedChildren {
                tree: self.tree,
                ids: &node.children,
            },
        )?;
        state.end()
    }
}

struct NestedChildren<'t> {
    tree: &'t DependencyTree,
    ids: &'t [NodeId],
}

impl Serialize for NestedChildren<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.ids.len()))?;
        for &id in self.ids {
            seq.serialize_element(&NestedNode { tree: self.tree, id })?;
        }
        seq.end()
    }
}

/// Tree build parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Deepest node depth allowed (direct dependencies are depth 1).
    pub max_depth: usize,
    /// Importer whose recorded versions guide root lookups.
    pub importer: Option<String>,
    /// Name of the synthetic root.
    pub root_name: String,
    /// Version of the synthetic root.
    pub root_version: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            importer: None,
            root_name: DEFAULT_ROOT_NAME.to_string(),
            root_version: "0.0.0".to_string(),
        }
    }
}

/// Per-build bookkeeping. Never shared between builds.
#[derive(Default)]
struct BuildState<'d> {
    /// Edges already expanded, keyed by (ancestor chain, child name).
    processed: HashSet<(Vec<String>, String)>,
    /// Memoized lookups. The chain is part of the key only for packages that
    /// have nested (location-specific) entries.
    lookups: HashMap<LookupKey, Option<&'d LockEntry>>,
    location_sensitive: HashMap<String, bool>,
}

#[derive(PartialEq, Eq, Hash)]
struct LookupKey {
    name: String,
    range: String,
    at_root: bool,
    scope: Vec<String>,
}

impl<'d> BuildState<'d> {
    fn lookup(
        &mut self,
        normalizer: &dyn LockfileNormalizer,
        data: &'d NormalizedLockData,
        importer: Option<&Importer>,
        name: &str,
        range: &str,
        path: &[String],
    ) -> Option<&'d LockEntry> {
        let sensitive = *self
            .location_sensitive
            .entry(name.to_string())
            .or_insert_with(|| data.entries_named(name).any(|e| !e.hierarchy.is_shared()));
        let key = LookupKey {
            name: name.to_string(),
            range: range.to_string(),
            at_root: path.is_empty(),
            scope: if sensitive { path.to_vec() } else { Vec::new() },
        };
        if let Some(cached) = self.lookups.get(&key) {
            return *cached;
        }
        let found = normalizer.find_entry(data, name, range, &LookupContext::new(importer, path));
        self.lookups.insert(key, found);
        found
    }
}

/// Builds a [`DependencyTree`] from normalized lock data and root
/// declarations.
///
/// # Examples
///
/// ```no_run
/// use lockscan_core::{LockfileNormalizer, RootDependencies, TreeBuilder};
///
/// fn build(normalizer: &dyn LockfileNormalizer, lockfile: &str, roots: &RootDependencies)
///     -> lockscan_core::Result<()>
/// {
///     let data = normalizer.normalize(lockfile)?;
///     let tree = TreeBuilder::new(normalizer)
///         .with_lock_data(&data)
///         .max_depth(8)
///         .build(roots)?;
///     println!("{} packages", tree.package_count());
///     Ok(())
/// }
/// ```
pub struct TreeBuilder<'a> {
    normalizer: &'a dyn LockfileNormalizer,
    lock_data: Option<&'a NormalizedLockData>,
    options: BuildOptions,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder that resolves entries through `normalizer`.
    pub fn new(normalizer: &'a dyn LockfileNormalizer) -> Self {
        Self {
            normalizer,
            lock_data: None,
            options: BuildOptions::default(),
        }
    }

    /// Supplies the normalized lock data to build from.
    pub fn with_lock_data(mut self, data: &'a NormalizedLockData) -> Self {
        self.lock_data = Some(data);
        self
    }

    /// Replaces all build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the depth bound.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Builds the tree.
    ///
    /// # Errors
    ///
    /// - [`Error::NoLockData`] if no lock data was supplied
    /// - [`Error::InvalidMaxDepth`] if `max_depth` is 0
    ///
    /// Dependencies without a matching lock entry are not errors; they are
    /// listed in [`DependencyTree::unresolved`].
    pub fn build(&self, root_deps: &RootDependencies) -> Result<DependencyTree> {
        let data = self.lock_data.ok_or(Error::NoLockData)?;
        if self.options.max_depth == 0 {
            return Err(Error::InvalidMaxDepth {
                value: self.options.max_depth,
            });
        }

        let importer = self
            .options
            .importer
            .as_deref()
            .and_then(|id| data.importer(id));
        let mut tree = DependencyTree::new(
            data.format(),
            &self.options.root_name,
            &self.options.root_version,
        );
        let mut state = BuildState::default();
        let mut path = Vec::new();

        for dep in root_deps.iter() {
            if let Some(child) = self.build_node(
                data,
                importer,
                &mut tree,
                &mut state,
                &dep.name,
                &dep.range,
                &mut path,
                dep.is_dev(),
            ) {
                let root = tree.root_id();
                tree.attach(root, child);
            }
        }

        tracing::debug!(
            format = %data.format(),
            packages = tree.package_count(),
            nodes = tree.node_count(),
            unresolved = tree.unresolved.len(),
            "built dependency tree"
        );
        Ok(tree)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_node<'d>(
        &self,
        data: &'d NormalizedLockData,
        importer: Option<&Importer>,
        tree: &mut DependencyTree,
        state: &mut BuildState<'d>,
        name: &str,
        range: &str,
        path: &mut Vec<String>,
        is_dev: bool,
    ) -> Option<NodeId> {
        let Some(entry) = state.lookup(self.normalizer, data, importer, name, range, path) else {
            tracing::debug!(package = name, range, path = ?path, "no lock entry, pruning branch");
            tree.unresolved.push(UnresolvedDependency {
                name: name.to_string(),
                range: range.to_string(),
                path: path.clone(),
            });
            return None;
        };

        let node = DependencyTreeNode::from_entry(entry, name, path.clone(), is_dev);
        let depth = node.depth;
        let id = tree.push(node);
        tracing::trace!(package = name, version = %entry.version, depth, "added node");

        if depth + 1 > self.options.max_depth {
            return Some(id);
        }

        // Declared name, so descendants' paths line up with install paths.
        path.push(name.to_string());
        for edge in &entry.dependencies {
            // `path` now ends with `name`, so this also rejects self-edges.
            if path.iter().any(|ancestor| *ancestor == edge.name) {
                continue;
            }
            if !state.processed.insert((path.clone(), edge.name.clone())) {
                continue;
            }
            if let Some(child) = self.build_node(
                data,
                importer,
                tree,
                state,
                &edge.name,
                &edge.range,
                path,
                is_dev,
            ) {
                tree.attach(id, child);
            }
        }
        path.pop();

        Some(id)
    }
}
