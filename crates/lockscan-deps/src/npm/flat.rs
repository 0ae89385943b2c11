//! package-lock.json v2/v3 (flat `packages` map keyed by install path)

use super::{split_install_path, str_field, string_map};
use lockscan_core::{
    DependencyKind, Error, Hierarchy, Importer, ImporterDependency, LockEntry, LockFormat,
    LockfileNormalizer, NormalizedLockData, Result,
};
use serde_json::{Map, Value};

/// Id of the importer built from the `""` record.
pub const ROOT_IMPORTER: &str = ".";

/// Normalizer for npm v2/v3 lockfiles.
///
/// `packages` keys are install paths (`node_modules/a/node_modules/b`). The
/// `""` record is the project itself and other non-`node_modules` keys are
/// workspace folders; both become importers. `link: true` records point at a
/// workspace folder and take their metadata from it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmFlatNormalizer;

impl NpmFlatNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self
    }
}

impl LockfileNormalizer for NpmFlatNormalizer {
    fn format(&self) -> LockFormat {
        LockFormat::NpmFlat
    }

    fn normalize(&self, content: &str) -> Result<NormalizedLockData> {
        let lock: Value = serde_json::from_str(content)
            .map_err(|e| Error::parse(LockFormat::NpmFlat, e.to_string()))?;
        let packages = match lock.get("packages") {
            Some(Value::Object(packages)) => packages,
            Some(_) => return Err(Error::parse(LockFormat::NpmFlat, "`packages` is not an object")),
            None if lock.is_object() => return Ok(NormalizedLockData::new(LockFormat::NpmFlat)),
            None => return Err(Error::parse(LockFormat::NpmFlat, "top level is not an object")),
        };

        let mut data = NormalizedLockData::new(LockFormat::NpmFlat);
        for (key, record) in packages {
            if !record.is_object() {
                tracing::warn!(key = %key, "skipping lock record that is not an object");
                continue;
            }
            if let Some((parents, key_name)) = split_install_path(key) {
                if let Some(entry) = entry_from_record(packages, key, parents, key_name, record) {
                    data.insert(entry);
                }
            } else if !key.is_empty() {
                tracing::trace!(key = %key, "workspace folder record");
            }
        }

        // Importers last so their resolved versions can be read off the
        // top-level entries.
        for (key, record) in packages {
            if split_install_path(key).is_some() || !record.is_object() {
                continue;
            }
            let id = if key.is_empty() { ROOT_IMPORTER } else { key.as_str() };
            data.add_importer(importer_from_record(id, record, &data));
        }

        tracing::debug!(
            entries = data.len(),
            importers = data.importers().len(),
            "normalized npm lockfile"
        );
        Ok(data)
    }
}

fn entry_from_record(
    packages: &Map<String, Value>,
    key: &str,
    parents: Vec<String>,
    key_name: String,
    record: &Value,
) -> Option<LockEntry> {
    let is_link = record.get("link").and_then(Value::as_bool).unwrap_or(false);
    let source = if is_link {
        let Some(target) = record.get("resolved").and_then(Value::as_str) else {
            tracing::warn!(key, "skipping link record without a target");
            return None;
        };
        match packages.get(target) {
            Some(target_record) if target_record.is_object() => target_record,
            _ => {
                tracing::warn!(key, target, "skipping link record with a missing target");
                return None;
            }
        }
    } else {
        record
    };

    let Some(version) = str_field(source, "version") else {
        tracing::warn!(key, "skipping lock record without a version");
        return None;
    };
    // A `name` field that differs from the install folder marks an alias:
    // dependents ask for the folder name, the package is `name`.
    let name = str_field(source, "name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| key_name.clone());

    let mut entry = LockEntry::new(key, name, version, Hierarchy::Nested(parents));
    entry.set_alias(key_name);
    entry.resolved_url = str_field(record, "resolved");
    entry.integrity = str_field(source, "integrity");
    entry.dev = record.get("dev").and_then(Value::as_bool).unwrap_or(false);
    for field in ["dependencies", "optionalDependencies", "peerDependencies"] {
        for (dep, range) in string_map(source.get(field), key) {
            entry.add_dependency(dep, range);
        }
    }
    Some(entry)
}

fn importer_from_record(id: &str, record: &Value, data: &NormalizedLockData) -> Importer {
    let mut importer = Importer::new(id);
    for kind in DependencyKind::all() {
        for (name, specifier) in string_map(record.get(kind.manifest_field()), id) {
            let version = data
                .get(&format!("node_modules/{}", name))
                .map(|entry| entry.version.clone());
            importer.push(ImporterDependency {
                name: name.to_string(),
                specifier: specifier.to_string(),
                version,
                kind: *kind,
            });
        }
    }
    importer
}
