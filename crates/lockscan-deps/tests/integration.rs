//! Integration tests for lockscan-deps
//!
//! The same diamond (`app-a -> common-lib@^1`, `app-b -> common-lib@^2`) is
//! written in every lockfile shape and must produce the same duplicate report.

use lockscan_core::{DuplicateDetector, Hierarchy, LockFormat, RootDependencies, TreeBuilder};
use lockscan_deps::{find_lockfile, load_lockfile, normalizer_for, RootManifest};
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "name": "diamond",
  "version": "1.0.0",
  "dependencies": {
    "app-a": "^1.0.0",
    "app-b": "^1.0.0"
  }
}"#;

const NPM_V1: &str = r#"{
  "name": "diamond",
  "lockfileVersion": 1,
  "dependencies": {
    "app-a": { "version": "1.0.0", "requires": { "common-lib": "^1.0.0" } },
    "app-b": {
      "version": "1.0.0",
      "requires": { "common-lib": "^2.0.0" },
      "dependencies": { "common-lib": { "version": "2.0.0" } }
    },
    "common-lib": { "version": "1.0.0" }
  }
}"#;

const NPM_V3: &str = r#"{
  "name": "diamond",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "diamond", "dependencies": { "app-a": "^1.0.0", "app-b": "^1.0.0" } },
    "node_modules/app-a": { "version": "1.0.0", "dependencies": { "common-lib": "^1.0.0" } },
    "node_modules/app-b": { "version": "1.0.0", "dependencies": { "common-lib": "^2.0.0" } },
    "node_modules/app-b/node_modules/common-lib": { "version": "2.0.0" },
    "node_modules/common-lib": { "version": "1.0.0" }
  }
}"#;

const YARN: &str = r#"# yarn lockfile v1


app-a@^1.0.0:
  version "1.0.0"
  dependencies:
    common-lib "^1.0.0"

app-b@^1.0.0:
  version "1.0.0"
  dependencies:
    common-lib "^2.0.0"

common-lib@^1.0.0:
  version "1.0.0"

common-lib@^2.0.0:
  version "2.0.0"
"#;

const PNPM: &str = r#"lockfileVersion: '9.0'

importers:
  .:
    dependencies:
      app-a:
        specifier: ^1.0.0
        version: 1.0.0
      app-b:
        specifier: ^1.0.0
        version: 1.0.0

packages:
  app-a@1.0.0:
    resolution: {integrity: sha512-a}
  app-b@1.0.0:
    resolution: {integrity: sha512-b}
  common-lib@1.0.0:
    resolution: {integrity: sha512-c1}
  common-lib@2.0.0:
    resolution: {integrity: sha512-c2}

snapshots:
  app-a@1.0.0:
    dependencies:
      common-lib: 1.0.0
  app-b@1.0.0:
    dependencies:
      common-lib: 2.0.0
  common-lib@1.0.0: {}
  common-lib@2.0.0: {}
"#;

const BUN: &str = r#"{
  "lockfileVersion": 1,
  "workspaces": {
    "": {
      "name": "diamond",
      "dependencies": { "app-a": "^1.0.0", "app-b": "^1.0.0", },
    },
  },
  "packages": {
    "app-a": ["app-a@1.0.0", "", { "dependencies": { "common-lib": "^1.0.0" } }, "sha512-a"],
    "app-b": ["app-b@1.0.0", "", { "dependencies": { "common-lib": "^2.0.0" } }, "sha512-b"],
    "app-b/common-lib": ["common-lib@2.0.0", "", {}, "sha512-c2"],
    "common-lib": ["common-lib@1.0.0", "", {}, "sha512-c1"],
  }
}
"#;

fn roots() -> RootDependencies {
    RootManifest::parse(MANIFEST, Path::new("package.json"))
        .unwrap()
        .root_dependencies(true)
}

fn assert_diamond(format: LockFormat, content: &str) {
    let normalizer = normalizer_for(format);
    let data = normalizer.normalize(content).unwrap();
    let tree = TreeBuilder::new(normalizer.as_ref())
        .with_lock_data(&data)
        .build(&roots())
        .unwrap();
    assert!(tree.unresolved().is_empty(), "{format}: {:?}", tree.unresolved());

    let summary = DuplicateDetector::new().detect(&tree);
    assert_eq!(summary.duplicate_packages, 1, "{format}");
    assert_eq!(summary.total_packages, 4, "{format}");

    let group = &summary.duplicates[0];
    assert_eq!(group.name, "common-lib");
    assert_eq!(group.versions, vec!["1.0.0", "2.0.0"], "{format}");

    let chains: Vec<String> = group
        .instances
        .iter()
        .map(|i| {
            i.chain
                .iter()
                .map(|link| link.to_string())
                .collect::<Vec<_>>()
                .join(" > ")
        })
        .collect();
    assert_eq!(chains, vec!["app-a@1.0.0", "app-b@1.0.0"], "{format}");
}

#[test]
fn test_diamond_npm_nested() {
    assert_diamond(LockFormat::NpmNested, NPM_V1);
}

#[test]
fn test_diamond_npm_flat() {
    assert_diamond(LockFormat::NpmFlat, NPM_V3);
}

#[test]
fn test_diamond_yarn() {
    assert_diamond(LockFormat::Yarn, YARN);
}

#[test]
fn test_diamond_pnpm() {
    assert_diamond(LockFormat::Pnpm, PNPM);
}

#[test]
fn test_diamond_bun() {
    assert_diamond(LockFormat::Bun, BUN);
}

#[test]
fn test_install_locations_follow_format() {
    let npm = normalizer_for(LockFormat::NpmFlat);
    let data = npm.normalize(NPM_V3).unwrap();
    let tree = TreeBuilder::new(npm.as_ref())
        .with_lock_data(&data)
        .build(&roots())
        .unwrap();
    let summary = DuplicateDetector::new().detect(&tree);
    let locations: Vec<String> = summary.duplicates[0]
        .instances
        .iter()
        .map(|i| i.install_location().to_string())
        .collect();
    assert_eq!(
        locations,
        vec![
            "node_modules/common-lib",
            "node_modules/app-b/node_modules/common-lib"
        ]
    );

    let yarn = normalizer_for(LockFormat::Yarn);
    let data = yarn.normalize(YARN).unwrap();
    let tree = TreeBuilder::new(yarn.as_ref())
        .with_lock_data(&data)
        .build(&roots())
        .unwrap();
    let summary = DuplicateDetector::new().detect(&tree);
    for instance in &summary.duplicates[0].instances {
        assert_eq!(instance.hierarchy, Hierarchy::Unknown);
        assert_eq!(instance.install_location().to_string(), "(transitive)");
    }
}

#[test]
fn test_importer_roots_without_manifest() {
    let pnpm = normalizer_for(LockFormat::Pnpm);
    let data = pnpm.normalize(PNPM).unwrap();
    let importer = data.importer(".").unwrap();
    let tree = TreeBuilder::new(pnpm.as_ref())
        .with_lock_data(&data)
        .build(&RootDependencies::from_importer(importer, true))
        .unwrap();
    assert_eq!(tree.root().children.len(), 2);
    assert_eq!(tree.package_count(), 4);
}

#[test]
fn test_load_from_project_directory() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("package.json"), MANIFEST).unwrap();
    std::fs::write(temp_dir.path().join("bun.lock"), BUN).unwrap();
    std::fs::write(temp_dir.path().join("package-lock.json"), NPM_V3).unwrap();

    let lockfile = load_lockfile(&find_lockfile(temp_dir.path()).unwrap()).unwrap();
    assert_eq!(lockfile.format(), LockFormat::Bun);

    let manifest = RootManifest::from_path(&temp_dir.path().join("package.json")).unwrap();
    let tree = TreeBuilder::new(lockfile.normalizer.as_ref())
        .with_lock_data(&lockfile.data)
        .build(&manifest.root_dependencies(true))
        .unwrap();
    assert_eq!(DuplicateDetector::new().detect(&tree).duplicate_packages, 1);
}
