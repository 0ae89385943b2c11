//! bun.lock
//!
//! JSON with two quirks: trailing commas are allowed, and each package is a
//! positional tuple `[name@version, resolution, metadata, integrity]` keyed
//! by its slash-joined install path (`parent/@scope/child`).

use crate::npm::string_map;
use lockscan_core::{
    split_name_version, DependencyKind, Error, Hierarchy, Importer, ImporterDependency, LockEntry,
    LockFormat, LockfileNormalizer, NormalizedLockData, Result,
};
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Id of the importer built from the `""` workspace.
pub const ROOT_IMPORTER: &str = ".";

/// Normalizer for bun text lockfiles.
#[derive(Debug, Default, Clone, Copy)]
pub struct BunNormalizer;

impl BunNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self
    }
}

impl LockfileNormalizer for BunNormalizer {
    fn format(&self) -> LockFormat {
        LockFormat::Bun
    }

    fn normalize(&self, content: &str) -> Result<NormalizedLockData> {
        let cleaned = strip_trailing_commas(content)?;
        let lock: Value = serde_json::from_str(&cleaned)
            .map_err(|e| Error::parse(LockFormat::Bun, e.to_string()))?;
        if !lock.is_object() {
            return Err(Error::parse(LockFormat::Bun, "top level is not an object"));
        }

        let mut data = NormalizedLockData::new(LockFormat::Bun);
        if let Some(packages) = lock.get("packages").and_then(Value::as_object) {
            for (key, tuple) in packages {
                if let Some(entry) = entry_from_tuple(key, tuple) {
                    data.insert(entry);
                }
            }
        }

        if let Some(workspaces) = lock.get("workspaces").and_then(Value::as_object) {
            for (path, workspace) in workspaces {
                let id = if path.is_empty() { ROOT_IMPORTER } else { path.as_str() };
                data.add_importer(importer_from_workspace(id, workspace, &data));
            }
        }

        tracing::debug!(
            entries = data.len(),
            importers = data.importers().len(),
            "normalized bun lockfile"
        );
        Ok(data)
    }
}

fn trailing_comma_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""(?:[^"\\]|\\.)*"|,(\s*[}\]])"#))
        .as_ref()
        .map_err(|e| Error::parse(LockFormat::Bun, e.to_string()))
}

/// Removes commas directly followed (after whitespace) by `}` or `]`.
/// String literals are matched as a whole so commas inside them survive.
fn strip_trailing_commas(content: &str) -> Result<Cow<'_, str>> {
    let pattern = trailing_comma_pattern()?;
    Ok(pattern.replace_all(content, |caps: &Captures<'_>| match caps.get(1) {
        Some(closing) => closing.as_str().to_string(),
        None => caps[0].to_string(),
    }))
}

/// Splits an install path into parents and package name, keeping
/// `@scope/name` together.
fn split_install_key(key: &str) -> Option<(Vec<String>, String)> {
    let mut names = Vec::new();
    let mut segments = key.split('/');
    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return None;
        }
        if segment.starts_with('@') {
            let name = segments.next().filter(|n| !n.is_empty())?;
            names.push(format!("{}/{}", segment, name));
        } else {
            names.push(segment.to_string());
        }
    }
    let name = names.pop()?;
    Some((names, name))
}

fn entry_from_tuple(key: &str, tuple: &Value) -> Option<LockEntry> {
    let Some(fields) = tuple.as_array() else {
        tracing::warn!(key, "skipping package that is not a tuple");
        return None;
    };
    let Some(spec) = fields.first().and_then(Value::as_str) else {
        tracing::warn!(key, "skipping package tuple without a name@version");
        return None;
    };
    let Some((name, version)) = split_name_version(spec) else {
        tracing::warn!(key, spec, "skipping package with a malformed name@version");
        return None;
    };
    let Some((parents, installed_as)) = split_install_key(key) else {
        tracing::warn!(key, "skipping package with a malformed install path");
        return None;
    };

    let mut entry = LockEntry::new(key, name, version, Hierarchy::Nested(parents));
    entry.set_alias(installed_as);
    entry.resolved_url = fields
        .get(1)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string);
    if let Some(metadata) = fields.get(2).filter(|m| m.is_object()) {
        for field in ["dependencies", "optionalDependencies", "peerDependencies"] {
            for (dep, range) in string_map(metadata.get(field), key) {
                entry.add_dependency(dep, range);
            }
        }
    }
    entry.integrity = fields.get(3).and_then(Value::as_str).map(str::to_string);
    Some(entry)
}

fn importer_from_workspace(id: &str, workspace: &Value, data: &NormalizedLockData) -> Importer {
    let mut importer = Importer::new(id);
    for kind in DependencyKind::all() {
        for (name, specifier) in string_map(workspace.get(kind.manifest_field()), id) {
            importer.push(ImporterDependency {
                name: name.to_string(),
                specifier: specifier.to_string(),
                version: data.get(name).map(|entry| entry.version.clone()),
                kind: *kind,
            });
        }
    }
    importer
}
