//! npm lockfiles and package.json

pub mod flat;
pub mod manifest;
pub mod nested;

pub use flat::NpmFlatNormalizer;
pub use manifest::RootManifest;
pub use nested::NpmNestedNormalizer;

use serde_json::Value;

/// Install path for `name` nested under `parents`:
/// `node_modules/a/node_modules/b`.
pub(crate) fn install_path(parents: &[String], name: &str) -> String {
    parents
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(name))
        .map(|segment| format!("node_modules/{}", segment))
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a `node_modules/...` install path into its parent chain and the
/// package name. Scoped names count as one segment.
///
/// Returns `None` for keys that are not install paths (workspace folders).
pub(crate) fn split_install_path(key: &str) -> Option<(Vec<String>, String)> {
    let rest = key.strip_prefix("node_modules/")?;
    let mut names: Vec<String> = rest
        .split("/node_modules/")
        .map(str::to_string)
        .collect();
    if names.iter().any(|n| n.is_empty() || !is_package_name(n)) {
        return None;
    }
    let name = names.pop()?;
    Some((names, name))
}

fn is_package_name(segment: &str) -> bool {
    match segment.strip_prefix('@') {
        Some(scoped) => scoped.split('/').count() == 2,
        None => !segment.contains('/'),
    }
}

/// `(name, range)` pairs of a JSON object whose values are strings, in
/// declaration order. Other values are dropped with a warning.
pub(crate) fn string_map<'v>(value: Option<&'v Value>, context: &str) -> Vec<(&'v str, &'v str)> {
    let Some(object) = value.and_then(Value::as_object) else {
        return Vec::new();
    };
    object
        .iter()
        .filter_map(|(name, range)| match range.as_str() {
            Some(range) => Some((name.as_str(), range)),
            None => {
                tracing::warn!(package = %name, context, "ignoring non-string dependency range");
                None
            }
        })
        .collect()
}

/// String field of a JSON object.
pub(crate) fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_path_round_trip() {
        let parents = vec!["a".to_string(), "@scope/b".to_string()];
        let path = install_path(&parents, "c");
        assert_eq!(path, "node_modules/a/node_modules/@scope/b/node_modules/c");
        assert_eq!(split_install_path(&path), Some((parents, "c".to_string())));
    }

    #[test]
    fn test_split_rejects_workspace_folders() {
        assert_eq!(split_install_path("packages/ui"), None);
        assert_eq!(split_install_path(""), None);
        assert_eq!(split_install_path("node_modules/a/b"), None);
        assert_eq!(
            split_install_path("node_modules/@types/node"),
            Some((vec![], "@types/node".to_string()))
        );
    }
}
