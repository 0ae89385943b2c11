//! # lockscan-deps
//!
//! Lockfile normalizers and package.json reading for JavaScript projects.
//!
//! This crate provides:
//! - One [`LockfileNormalizer`](lockscan_core::LockfileNormalizer) per
//!   lockfile shape (npm v1, npm v2/v3, yarn, pnpm, bun)
//! - Lockfile discovery and format detection
//! - The root manifest reader for `package.json`
//!
//! ## Example
//!
//! ```rust,no_run
//! use lockscan_core::{DuplicateDetector, TreeBuilder};
//! use lockscan_deps::{find_lockfile, load_lockfile, RootManifest};
//! use std::path::Path;
//!
//! # fn example() -> lockscan_core::Result<()> {
//! let project = Path::new(".");
//! let lockfile = load_lockfile(&find_lockfile(project)?)?;
//! let manifest = RootManifest::from_path(&project.join("package.json"))?;
//!
//! let tree = TreeBuilder::new(lockfile.normalizer.as_ref())
//!     .with_lock_data(&lockfile.data)
//!     .build(&manifest.root_dependencies(true))?;
//! let summary = DuplicateDetector::new().detect(&tree);
//! println!("{} duplicated packages", summary.duplicate_packages);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bun;
pub mod detect;
pub mod npm;
pub mod pnpm;
pub mod yarn;

pub use bun::BunNormalizer;
pub use detect::{find_lockfile, load_lockfile, normalizer_for, LoadedLockfile};
pub use npm::{NpmFlatNormalizer, NpmNestedNormalizer, RootManifest};
pub use pnpm::PnpmNormalizer;
pub use yarn::YarnNormalizer;

/// Splits `name@spec` at the first `@` after a leading scope marker, so
/// specs that themselves contain `@` (`npm:other@^1.0.0`) stay intact.
pub(crate) fn split_package_spec(spec: &str) -> Option<(&str, &str)> {
    let at = spec.get(1..)?.find('@')? + 1;
    Some((&spec[..at], &spec[at + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_package_spec() {
        assert_eq!(split_package_spec("@scope/pkg@^1.0.0"), Some(("@scope/pkg", "^1.0.0")));
        assert_eq!(
            split_package_spec("alias@npm:real@^2.0.0"),
            Some(("alias", "npm:real@^2.0.0"))
        );
        assert_eq!(split_package_spec("nothing"), None);
        assert_eq!(split_package_spec(""), None);
    }
}
