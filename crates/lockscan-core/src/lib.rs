//! Lockscan Core - lockfile data model, dependency trees and duplicates.
//!
//! This crate holds everything that does not depend on a particular lockfile
//! syntax:
//!
//! - [`NormalizedLockData`]: the common shape every lockfile is reduced to
//! - [`LockfileNormalizer`]: trait implemented once per lockfile format
//! - [`TreeBuilder`]: expands root dependencies into a [`DependencyTree`]
//! - [`DuplicateDetector`]: reports packages installed more than once
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  lockscan-cli   │  (User interface)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  lockscan-deps  │  (Format normalizers, package.json)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  lockscan-core  │  (This crate - model, tree, duplicates)
//! └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lockscan_core::{DuplicateDetector, LockfileNormalizer, RootDependencies, TreeBuilder};
//!
//! fn report(normalizer: &dyn LockfileNormalizer, lockfile: &str, roots: &RootDependencies)
//!     -> lockscan_core::Result<()>
//! {
//!     let data = normalizer.normalize(lockfile)?;
//!     let tree = TreeBuilder::new(normalizer).with_lock_data(&data).build(roots)?;
//!     let summary = DuplicateDetector::new().detect(&tree);
//!     println!("{} duplicated packages", summary.duplicate_packages);
//!     Ok(())
//! }
//! ```

pub mod duplicates;
pub mod error;
pub mod normalizer;
pub mod tree;
pub mod types;
pub mod version;

pub use duplicates::{
    ChainDisplay, ChainLink, ChainSegment, DuplicateDetector, DuplicateGroup, DuplicateInstance,
    DuplicateSummary, InstallLocation, DEFAULT_MAX_CHAIN_HOPS,
};
pub use error::{Error, Result};
pub use normalizer::{find_entry, LockfileNormalizer, LookupContext};
pub use tree::{
    BuildOptions, DependencyTree, DependencyTreeNode, NodeId, TreeBuilder, UnresolvedDependency,
    Walk, DEFAULT_MAX_DEPTH, DEFAULT_ROOT_NAME,
};
pub use types::{
    alias_target, composite_key, split_name_version, DependencyEdge, DependencyKind, Hierarchy,
    Importer, ImporterDependency, LockEntry, LockFormat, NormalizedLockData, RootDependencies,
    RootDependency,
};
