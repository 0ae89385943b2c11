//! package-lock.json v1 (nested `dependencies` objects)

use super::{install_path, str_field, string_map};
use lockscan_core::{
    alias_target, Error, Hierarchy, LockEntry, LockFormat, LockfileNormalizer, NormalizedLockData,
    Result,
};
use serde_json::{Map, Value};

/// Normalizer for npm v1 lockfiles.
///
/// Every package sits under the `dependencies` object of the package it is
/// installed beneath, so the install location is known for every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmNestedNormalizer;

impl NpmNestedNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self
    }
}

impl LockfileNormalizer for NpmNestedNormalizer {
    fn format(&self) -> LockFormat {
        LockFormat::NpmNested
    }

    fn normalize(&self, content: &str) -> Result<NormalizedLockData> {
        let lock: Value = serde_json::from_str(content)
            .map_err(|e| Error::parse(LockFormat::NpmNested, e.to_string()))?;
        let root = lock
            .as_object()
            .ok_or_else(|| Error::parse(LockFormat::NpmNested, "top level is not an object"))?;

        let mut data = NormalizedLockData::new(LockFormat::NpmNested);
        if let Some(dependencies) = root.get("dependencies").and_then(Value::as_object) {
            let mut parents = Vec::new();
            collect(dependencies, &mut parents, &mut data);
        }

        tracing::debug!(entries = data.len(), "normalized npm v1 lockfile");
        Ok(data)
    }
}

fn collect(dependencies: &Map<String, Value>, parents: &mut Vec<String>, data: &mut NormalizedLockData) {
    for (name, record) in dependencies {
        let key = install_path(parents, name);
        let Some(version) = str_field(record, "version") else {
            tracing::warn!(key = %key, "skipping lock record without a version");
            continue;
        };

        // Aliased installs record `npm:real@1.0.0` as their version.
        let mut entry = match alias_target(&version) {
            Some((real, real_version)) => {
                let mut entry =
                    LockEntry::new(key, real, real_version, Hierarchy::Nested(parents.clone()));
                entry.set_alias(name.as_str());
                entry
            }
            None => LockEntry::new(key, name.as_str(), version, Hierarchy::Nested(parents.clone())),
        };
        entry.resolved_url = str_field(record, "resolved");
        entry.integrity = str_field(record, "integrity");
        entry.dev = record.get("dev").and_then(Value::as_bool).unwrap_or(false);
        for (dep, range) in string_map(record.get("requires"), name) {
            entry.add_dependency(dep, range);
        }
        data.insert(entry);

        if let Some(nested) = record.get("dependencies").and_then(Value::as_object) {
            parents.push(name.clone());
            collect(nested, parents, data);
            parents.pop();
        }
    }
}
