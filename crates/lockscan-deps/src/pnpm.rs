//! pnpm-lock.yaml
//!
//! Three layouts are in the wild:
//!
//! - v5: `/name/1.0.0` package keys, peer suffixes after `_`, top-level or
//!   per-importer `specifiers` maps
//! - v6: `/name@1.0.0` keys, peer suffixes in parentheses, importer
//!   dependencies as `{specifier, version}` objects
//! - v9: bare `name@1.0.0` keys, edges moved from `packages` to `snapshots`

use crate::split_package_spec;
use lockscan_core::{
    find_entry, DependencyKind, Error, Hierarchy, Importer, ImporterDependency, LockEntry,
    LockFormat, LockfileNormalizer, LookupContext, NormalizedLockData, Result,
};
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};

/// Id of the project root importer.
pub const ROOT_IMPORTER: &str = ".";

const EDGE_SECTIONS: &[&str] = &["dependencies", "optionalDependencies", "peerDependencies"];

/// Normalizer for pnpm lockfiles.
///
/// pnpm installs every `name@version` once in a content-addressed store, so
/// entries are [`Hierarchy::Flat`] and edges carry resolved versions rather
/// than ranges.
#[derive(Debug, Default, Clone, Copy)]
pub struct PnpmNormalizer;

impl PnpmNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self
    }
}

impl LockfileNormalizer for PnpmNormalizer {
    fn format(&self) -> LockFormat {
        LockFormat::Pnpm
    }

    fn normalize(&self, content: &str) -> Result<NormalizedLockData> {
        let lock: Value = serde_yaml::from_str(content)
            .map_err(|e| Error::parse(LockFormat::Pnpm, e.to_string()))?;
        let mut data = NormalizedLockData::new(LockFormat::Pnpm);
        let root = match &lock {
            Value::Mapping(root) => root,
            Value::Null => return Ok(data),
            _ => return Err(Error::parse(LockFormat::Pnpm, "top level is not a mapping")),
        };

        let mut aliases = Vec::new();
        let importers = read_importers(root, &mut aliases);
        let mut specifiers: HashMap<(String, String), Vec<String>> = HashMap::new();
        for importer in &importers {
            for dep in &importer.dependencies {
                let Some(version) = dep.version.clone() else {
                    continue;
                };
                let target = aliases
                    .iter()
                    .find(|a| a.alias == dep.name && a.version == version)
                    .map_or(dep.name.as_str(), |a| a.target.as_str());
                let known = specifiers.entry((target.to_string(), version)).or_default();
                if !known.contains(&dep.specifier) {
                    known.push(dep.specifier.clone());
                }
            }
        }

        for (key, package, record) in read_records(root) {
            let mut entry = LockEntry::new(key, &package.name, &package.version, Hierarchy::Flat);
            if let Some(resolution) = package.metadata.get("resolution") {
                entry.integrity = scalar(resolution.get("integrity"));
                entry.resolved_url = scalar(resolution.get("tarball"));
            }
            entry.dev = package.metadata.get("dev").and_then(Value::as_bool).unwrap_or(false);
            for (dep, version) in edges(record) {
                entry.add_dependency(dep, version);
            }

            let variant = (package.name.clone(), package.peer_version.clone());
            if let Some(known) = specifiers.get(&variant) {
                entry.specifiers = known.clone();
            }
            // The suffixed version tells peer variants of one package apart.
            let (_, peer_version) = variant;
            if peer_version != package.version && !entry.specifiers.contains(&peer_version) {
                entry.specifiers.push(peer_version);
            }
            data.insert(entry);
        }

        for alias in &aliases {
            let keys: Vec<String> = data
                .entries_named(&alias.target)
                .filter(|e| e.version == alias.version || e.specifiers.contains(&alias.version))
                .map(|e| e.raw_key.clone())
                .collect();
            if keys.is_empty() {
                tracing::warn!(
                    alias = %alias.alias,
                    target = %alias.target,
                    "alias target not in lockfile"
                );
            }
            for key in keys {
                data.register_alias(&alias.alias, &key);
            }
        }
        for importer in importers {
            data.add_importer(importer);
        }

        tracing::debug!(
            entries = data.len(),
            importers = data.importers().len(),
            "normalized pnpm lockfile"
        );
        Ok(data)
    }

    /// Peer-suffixed versions that match no variant fall back to the bare
    /// version.
    fn find_entry<'d>(
        &self,
        data: &'d NormalizedLockData,
        name: &str,
        range: &str,
        context: &LookupContext<'_>,
    ) -> Option<&'d LockEntry> {
        find_entry(data, name, range, context).or_else(|| {
            let bare = strip_peer_suffix(range);
            (bare != range)
                .then(|| find_entry(data, name, bare, context))
                .flatten()
        })
    }
}

/// A parsed package or snapshot key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PackageKey {
    name: String,
    /// Version without the peer suffix.
    version: String,
    /// Version as written in the key, peer suffix included.
    peer_version: String,
}

/// A package key together with its `packages` record.
struct Package<'v> {
    name: String,
    version: String,
    peer_version: String,
    metadata: &'v Value,
}

/// An importer dependency installed under another name
/// (`alias: {specifier: npm:real@^1.0.0, version: real@1.0.0}`).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImporterAlias {
    alias: String,
    target: String,
    version: String,
}

/// One `(raw key, package, edge record)` per installed package variant.
///
/// v9 splits package metadata (`packages`) from per-variant edges
/// (`snapshots`): every snapshot key becomes its own entry and borrows
/// metadata from the package record of the same `name@version`. Packages
/// without a snapshot, and every package of older layouts, are read from
/// `packages` alone.
fn read_records(root: &Mapping) -> Vec<(String, Package<'_>, &Value)> {
    let mut packages: Vec<(String, PackageKey, &Value)> = Vec::new();
    if let Some(map) = root.get("packages").and_then(Value::as_mapping) {
        for (key, record) in map {
            let Some(key) = key.as_str() else {
                tracing::warn!("skipping package with a non-string key");
                continue;
            };
            let Some(parsed) = parse_package_key(key) else {
                tracing::warn!(key, "skipping package with an unrecognised key");
                continue;
            };
            packages.push((key.to_string(), parsed, record));
        }
    }

    let mut by_version: HashMap<(&str, &str), &Value> = HashMap::with_capacity(packages.len());
    for (_, parsed, record) in &packages {
        by_version
            .entry((parsed.name.as_str(), parsed.version.as_str()))
            .or_insert(*record);
    }

    let mut records = Vec::new();
    let mut with_snapshot: HashSet<(String, String)> = HashSet::new();
    if let Some(snapshots) = root.get("snapshots").and_then(Value::as_mapping) {
        for (key, snapshot) in snapshots {
            let Some((key, parsed)) = key.as_str().and_then(|k| Some((k, parse_package_key(k)?))) else {
                tracing::warn!("skipping snapshot with an unrecognised key");
                continue;
            };
            let metadata = match by_version.get(&(parsed.name.as_str(), parsed.version.as_str())) {
                Some(record) => *record,
                None => {
                    tracing::debug!(key, "snapshot without a package record");
                    snapshot
                }
            };
            with_snapshot.insert((parsed.name.clone(), parsed.version.clone()));
            records.push((key.to_string(), Package::new(parsed, metadata), snapshot));
        }
    }

    for (key, parsed, record) in packages {
        if with_snapshot.contains(&(parsed.name.clone(), parsed.version.clone())) {
            continue;
        }
        records.push((key, Package::new(parsed, record), record));
    }
    records
}

impl<'v> Package<'v> {
    fn new(key: PackageKey, metadata: &'v Value) -> Self {
        Self {
            name: key.name,
            version: key.version,
            peer_version: key.peer_version,
            metadata,
        }
    }
}

/// Importers from the `importers` table, or the single-project layout with
/// dependency sections at the top level. Aliased dependencies are collected
/// into `aliases`.
fn read_importers(root: &Mapping, aliases: &mut Vec<ImporterAlias>) -> Vec<Importer> {
    match root.get("importers").and_then(Value::as_mapping) {
        Some(importers) => importers
            .iter()
            .filter_map(|(id, record)| {
                let id = scalar(Some(id))?;
                Some(read_importer(&id, record.as_mapping()?, aliases))
            })
            .collect(),
        None => {
            let single = read_importer(ROOT_IMPORTER, root, aliases);
            if single.dependencies.is_empty() {
                Vec::new()
            } else {
                vec![single]
            }
        }
    }
}

fn read_importer(id: &str, record: &Mapping, aliases: &mut Vec<ImporterAlias>) -> Importer {
    let legacy_specifiers = record.get("specifiers").and_then(Value::as_mapping);
    let mut importer = Importer::new(id);

    for kind in DependencyKind::all() {
        let Some(section) = record.get(kind.manifest_field()).and_then(Value::as_mapping) else {
            continue;
        };
        for (name, value) in section {
            let Some(name) = name.as_str() else {
                continue;
            };
            let (specifier, version) = match value {
                Value::Mapping(detail) => (
                    scalar(detail.get("specifier")),
                    scalar(detail.get("version")),
                ),
                other => (
                    legacy_specifiers.and_then(|s| scalar(s.get(name))),
                    scalar(Some(other)),
                ),
            };
            let Some(version) = version else {
                tracing::warn!(importer = id, package = name, "importer dependency without a version");
                continue;
            };
            let (target, version) = split_version_ref(&version);
            if let Some(target) = target.filter(|t| t != name) {
                let alias = ImporterAlias {
                    alias: name.to_string(),
                    target,
                    version: version.clone(),
                };
                if !aliases.contains(&alias) {
                    aliases.push(alias);
                }
            }
            importer.push(ImporterDependency {
                name: name.to_string(),
                specifier: specifier.unwrap_or_else(|| version.clone()),
                version: Some(version),
                kind: *kind,
            });
        }
    }
    importer
}

/// Dependency edges of a package or snapshot record as `(name, version)`,
/// peer suffixes kept. Aliased edges (`alias: real@1.0.0`) point at the real
/// package.
fn edges(record: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for section in EDGE_SECTIONS {
        let Some(map) = record.get(*section).and_then(Value::as_mapping) else {
            continue;
        };
        for (name, value) in map {
            let (Some(name), Some(value)) = (name.as_str(), scalar(Some(value))) else {
                continue;
            };
            match split_version_ref(&value) {
                (Some(real), version) => out.push((real, version)),
                (None, version) => out.push((name.to_string(), version)),
            }
        }
    }
    out
}

/// Splits a resolved version reference into the aliased package name, when
/// there is one, and the version with its peer suffix.
///
/// `18.2.0(react@18.2.0)` and `18.2.0_react@18.2.0` are plain versions;
/// `string-width@4.2.3`, `/string-width@4.2.3` and `/string-width/4.2.3`
/// point at another package. `link:` and `file:` references are kept whole.
fn split_version_ref(value: &str) -> (Option<String>, String) {
    if value.starts_with("link:") || value.starts_with("file:") {
        return (None, value.to_string());
    }
    let bare = strip_peer_suffix(value);
    if !bare.contains('@') && !bare.contains('/') {
        return (None, value.to_string());
    }
    match parse_package_key(value) {
        Some(key) => (Some(key.name), key.peer_version),
        None => (None, value.to_string()),
    }
}

/// Parses the package key forms `/name/1.0.0`, `/name@1.0.0` and
/// `name@1.0.0`, each with an optional peer suffix.
fn parse_package_key(key: &str) -> Option<PackageKey> {
    let key = key.strip_prefix('/').unwrap_or(key);
    let bare = key.split('(').next().unwrap_or(key);

    // v5: the version follows the last slash and starts with a digit.
    let mut parsed = None;
    if let Some((name, version)) = bare.rsplit_once('/') {
        let version = strip_peer_suffix(version);
        let plain_name = !name.get(1..).unwrap_or("").contains('@');
        if plain_name && version.starts_with(|c: char| c.is_ascii_digit()) && !version.contains('@') {
            parsed = Some((name, version));
        }
    }
    let (name, version) = match parsed {
        Some(parsed) => parsed,
        None => split_package_spec(bare)?,
    };
    if version.is_empty() {
        return None;
    }

    Some(PackageKey {
        name: name.to_string(),
        version: version.to_string(),
        peer_version: key.get(name.len() + 1..)?.to_string(),
    })
}

/// Drops `(peer@1.0.0)` and `_peer@1.0.0` suffixes from a version.
fn strip_peer_suffix(version: &str) -> &str {
    let version = version.split('(').next().unwrap_or(version);
    version.split('_').next().unwrap_or(version)
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
