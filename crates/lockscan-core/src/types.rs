//! Core data types shared by every lockfile format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lockfile shapes understood by lockscan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockFormat {
    /// npm `package-lock.json` v1: nested per-dependency objects.
    NpmNested,
    /// npm `package-lock.json` v2/v3: flat `node_modules/...` keyed map.
    NpmFlat,
    /// `yarn.lock` (classic and berry): indented text blocks.
    Yarn,
    /// `pnpm-lock.yaml`: importer / package / snapshot tables.
    Pnpm,
    /// `bun.lock`: JSON with array-encoded package tuples.
    Bun,
}

impl LockFormat {
    /// Returns all formats in a consistent order
    pub fn all() -> &'static [LockFormat] {
        &[
            LockFormat::NpmNested,
            LockFormat::NpmFlat,
            LockFormat::Yarn,
            LockFormat::Pnpm,
            LockFormat::Bun,
        ]
    }

    /// Short identifier, identical to the serialized form.
    pub fn id(&self) -> &'static str {
        match self {
            LockFormat::NpmNested => "npm-nested",
            LockFormat::NpmFlat => "npm-flat",
            LockFormat::Yarn => "yarn",
            LockFormat::Pnpm => "pnpm",
            LockFormat::Bun => "bun",
        }
    }

    /// Whether entries of this format record where they are installed.
    ///
    /// Yarn lockfiles carry no install locations at all; callers must not
    /// invent one for them.
    pub fn records_hierarchy(&self) -> bool {
        !matches!(self, LockFormat::Yarn)
    }

    /// Lockfile names checked when searching a directory, in priority order.
    pub fn file_names() -> &'static [&'static str] {
        &[
            "bun.lock",
            "pnpm-lock.yaml",
            "yarn.lock",
            "npm-shrinkwrap.json",
            "package-lock.json",
        ]
    }

    /// Detects the format from a lockfile name and its content.
    ///
    /// npm lockfiles are told apart by `lockfileVersion`: version 1 (or no
    /// version at all) is the nested layout, anything newer is flat.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedLockfile`] for unknown file names
    /// and [`crate::Error::Parse`] when an npm lockfile is not valid JSON.
    pub fn detect(file_name: &str, content: &str) -> crate::Result<Self> {
        match file_name {
            "package-lock.json" | "npm-shrinkwrap.json" => {
                #[derive(Deserialize)]
                struct Header {
                    #[serde(rename = "lockfileVersion")]
                    lockfile_version: Option<u64>,
                }
                let header: Header = serde_json::from_str(content)
                    .map_err(|e| crate::Error::parse(LockFormat::NpmFlat, e.to_string()))?;
                match header.lockfile_version {
                    None | Some(1) => Ok(LockFormat::NpmNested),
                    Some(_) => Ok(LockFormat::NpmFlat),
                }
            }
            "yarn.lock" => Ok(LockFormat::Yarn),
            "pnpm-lock.yaml" => Ok(LockFormat::Pnpm),
            "bun.lock" => Ok(LockFormat::Bun),
            other => Err(crate::Error::UnsupportedLockfile {
                file_name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for LockFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockFormat::NpmNested => "package-lock.json (v1)",
            LockFormat::NpmFlat => "package-lock.json",
            LockFormat::Yarn => "yarn.lock",
            LockFormat::Pnpm => "pnpm-lock.yaml",
            LockFormat::Bun => "bun.lock",
        };
        f.write_str(name)
    }
}

/// Where a lock entry sits in the installed layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "parents")]
pub enum Hierarchy {
    /// Install location is known. Holds the chain of package names the entry
    /// is nested under; empty means top level (hoisted).
    Nested(Vec<String>),
    /// Shared store keyed by `name@version`; every dependent uses the entry.
    Flat,
    /// The lockfile does not record an install location.
    Unknown,
}

impl Hierarchy {
    /// Top-level entry of a location-aware lockfile.
    pub fn top_level() -> Self {
        Hierarchy::Nested(Vec::new())
    }

    /// True when the entry is nested directly under `parent`.
    pub fn is_nested_under(&self, parent: &str) -> bool {
        match self {
            Hierarchy::Nested(parents) => parents.last().is_some_and(|p| p == parent),
            _ => false,
        }
    }

    /// True for entries any dependent may resolve to.
    pub fn is_shared(&self) -> bool {
        match self {
            Hierarchy::Nested(parents) => parents.is_empty(),
            Hierarchy::Flat | Hierarchy::Unknown => true,
        }
    }
}

/// A dependency edge recorded on a lock entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Dependency package name.
    pub name: String,
    /// Declared range, or the concrete resolved version for formats that
    /// record one (pnpm).
    pub range: String,
}

/// One resolved package record from a lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    /// Format-specific identity key (install path, `name@version`, or the
    /// yarn header).
    pub raw_key: String,
    /// Package name.
    pub name: String,
    /// Name dependents use for this entry when it is installed under an
    /// alias (`"alias": "npm:real@^1.0.0"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Resolved version.
    pub version: String,
    /// Tarball or registry URL the package was resolved from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    /// Integrity hash as written in the lockfile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    /// Outgoing dependency edges in lockfile order.
    pub dependencies: Vec<DependencyEdge>,
    /// Install location knowledge.
    pub hierarchy: Hierarchy,
    /// Declared ranges the lockfile maps to this entry verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specifiers: Vec<String>,
    /// Lockfile's own development-only marker.
    #[serde(default)]
    pub dev: bool,
}

impl LockEntry {
    /// Creates an entry with no edges.
    pub fn new(
        raw_key: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        hierarchy: Hierarchy,
    ) -> Self {
        Self {
            raw_key: raw_key.into(),
            name: name.into(),
            alias: None,
            version: version.into(),
            resolved_url: None,
            integrity: None,
            dependencies: Vec::new(),
            hierarchy,
            specifiers: Vec::new(),
            dev: false,
        }
    }

    /// Adds an edge unless one with the same name already exists.
    pub fn add_dependency(&mut self, name: impl Into<String>, range: impl Into<String>) {
        let name = name.into();
        if self.dependencies.iter().any(|d| d.name == name) {
            return;
        }
        self.dependencies.push(DependencyEdge {
            name,
            range: range.into(),
        });
    }

    /// Composite `name@version` key.
    pub fn composite_key(&self) -> String {
        composite_key(&self.name, &self.version)
    }

    /// Name dependents ask for: the alias when there is one.
    pub fn lookup_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Marks the entry as installed under `alias`. A no-op when the alias is
    /// the package name itself.
    pub fn set_alias(&mut self, alias: impl Into<String>) {
        let alias = alias.into();
        self.alias = (alias != self.name).then_some(alias);
    }
}

/// Builds the `name@version` key used to index tree instances.
pub fn composite_key(name: &str, version: &str) -> String {
    format!("{}@{}", name, version)
}

/// Splits `name@version` (or `name@range`) at the last `@` that is not the
/// leading scope marker.
///
/// ```
/// use lockscan_core::types::split_name_version;
///
/// assert_eq!(split_name_version("@types/node@20.1.0"), Some(("@types/node", "20.1.0")));
/// assert_eq!(split_name_version("react"), None);
/// ```
pub fn split_name_version(spec: &str) -> Option<(&str, &str)> {
    let at = spec.rfind('@')?;
    if at == 0 {
        return None;
    }
    Some((&spec[..at], &spec[at + 1..]))
}

/// Target of an npm alias range: `npm:real@^1.0.0` gives `("real", "^1.0.0")`.
///
/// ```
/// use lockscan_core::types::alias_target;
///
/// assert_eq!(alias_target("npm:string-width@^4.2.0"), Some(("string-width", "^4.2.0")));
/// assert_eq!(alias_target("npm:@scope/pkg@1.0.0"), Some(("@scope/pkg", "1.0.0")));
/// assert_eq!(alias_target("^4.2.0"), None);
/// ```
pub fn alias_target(range: &str) -> Option<(&str, &str)> {
    let target = range.trim().strip_prefix("npm:")?;
    let (name, range) = split_name_version(target)?;
    (!range.is_empty()).then_some((name, range))
}

/// Which manifest section a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// `dependencies`
    Production,
    /// `devDependencies`
    Development,
    /// `peerDependencies`
    Peer,
    /// `optionalDependencies`
    Optional,
}

impl DependencyKind {
    /// Manifest field name for this kind.
    pub fn manifest_field(&self) -> &'static str {
        match self {
            DependencyKind::Production => "dependencies",
            DependencyKind::Development => "devDependencies",
            DependencyKind::Peer => "peerDependencies",
            DependencyKind::Optional => "optionalDependencies",
        }
    }

    /// Merge order used when flattening manifest sections.
    pub fn all() -> &'static [DependencyKind] {
        &[
            DependencyKind::Production,
            DependencyKind::Development,
            DependencyKind::Peer,
            DependencyKind::Optional,
        ]
    }
}

/// A dependency declared by an importer inside the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterDependency {
    /// Package name.
    pub name: String,
    /// Declared range.
    pub specifier: String,
    /// Concrete version the lockfile resolved it to, when recorded.
    pub version: Option<String>,
    /// Manifest section.
    pub kind: DependencyKind,
}

/// A project or workspace member whose declared dependencies are recorded in
/// the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Importer {
    /// Importer id (`.` for the project root, otherwise a workspace path).
    pub id: String,
    /// Declared dependencies in lockfile order.
    pub dependencies: Vec<ImporterDependency>,
}

impl Importer {
    /// Creates an importer with no dependencies.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
        }
    }

    /// Resolved version recorded for `name`, if any.
    pub fn resolved_version(&self, name: &str) -> Option<&str> {
        self.dependencies
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.version.as_deref())
    }

    /// Appends a dependency unless the name is already declared.
    pub fn push(&mut self, dependency: ImporterDependency) {
        if self.dependencies.iter().any(|d| d.name == dependency.name) {
            return;
        }
        self.dependencies.push(dependency);
    }
}

/// Normalized view of a lockfile. Built once per parse, read-only afterwards.
#[derive(Debug, Clone)]
pub struct NormalizedLockData {
    format: LockFormat,
    entries: Vec<LockEntry>,
    by_key: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    importers: Vec<Importer>,
}

impl NormalizedLockData {
    /// Creates empty data for `format`.
    pub fn new(format: LockFormat) -> Self {
        Self {
            format,
            entries: Vec::new(),
            by_key: HashMap::new(),
            by_name: HashMap::new(),
            importers: Vec::new(),
        }
    }

    /// Source format.
    pub fn format(&self) -> LockFormat {
        self.format
    }

    /// Adds an entry. Returns `false` (and keeps the first) when the raw key
    /// is already present.
    pub fn insert(&mut self, entry: LockEntry) -> bool {
        if self.by_key.contains_key(&entry.raw_key) {
            return false;
        }
        let index = self.entries.len();
        self.by_key.insert(entry.raw_key.clone(), index);
        self.by_name
            .entry(entry.lookup_name().to_string())
            .or_default()
            .push(index);
        self.entries.push(entry);
        true
    }

    /// Makes the entry at `raw_key` reachable under `alias` as well as its
    /// own name. For lockfiles that share one entry between the real name
    /// and any number of aliases. Returns `false` for unknown keys.
    pub fn register_alias(&mut self, alias: &str, raw_key: &str) -> bool {
        let Some(&index) = self.by_key.get(raw_key) else {
            return false;
        };
        let indexes = self.by_name.entry(alias.to_string()).or_default();
        if !indexes.contains(&index) {
            indexes.push(index);
        }
        true
    }

    /// Adds an importer, replacing one with the same id.
    pub fn add_importer(&mut self, importer: Importer) {
        match self.importers.iter_mut().find(|i| i.id == importer.id) {
            Some(existing) => *existing = importer,
            None => self.importers.push(importer),
        }
    }

    /// Entry by raw key.
    pub fn get(&self, raw_key: &str) -> Option<&LockEntry> {
        self.by_key.get(raw_key).map(|&i| &self.entries[i])
    }

    /// All entries in lockfile order.
    pub fn entries(&self) -> impl Iterator<Item = &LockEntry> {
        self.entries.iter()
    }

    /// Entries dependents reach as `name`, in lockfile order. Aliased entries
    /// are listed under their alias.
    pub fn entries_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a LockEntry> + 'a {
        self.by_name
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.entries[i])
    }

    /// Importers in lockfile order.
    pub fn importers(&self) -> &[Importer] {
        &self.importers
    }

    /// Importer by id.
    pub fn importer(&self, id: &str) -> Option<&Importer> {
        self.importers.iter().find(|i| i.id == id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries were normalized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One dependency declared at the root of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDependency {
    /// Package name.
    pub name: String,
    /// Declared range.
    pub range: String,
    /// Manifest section it was declared in.
    pub kind: DependencyKind,
}

impl RootDependency {
    /// Whether the dependency is development-only.
    pub fn is_dev(&self) -> bool {
        self.kind == DependencyKind::Development
    }
}

/// Ordered, merged root dependency declarations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RootDependencies {
    entries: Vec<RootDependency>,
}

impl RootDependencies {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration; the first declaration of a name wins.
    pub fn push(&mut self, name: impl Into<String>, range: impl Into<String>, kind: DependencyKind) {
        let name = name.into();
        if self.contains(&name) {
            return;
        }
        self.entries.push(RootDependency {
            name,
            range: range.into(),
            kind,
        });
    }

    /// Builds root declarations from a lockfile importer.
    pub fn from_importer(importer: &Importer, include_dev: bool) -> Self {
        let mut deps = Self::new();
        for kind in DependencyKind::all() {
            if *kind == DependencyKind::Development && !include_dev {
                continue;
            }
            for dep in importer.dependencies.iter().filter(|d| d.kind == *kind) {
                deps.push(dep.name.clone(), dep.specifier.clone(), dep.kind);
            }
        }
        deps
    }

    /// True when `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|d| d.name == name)
    }

    /// Declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = &RootDependency> {
        self.entries.iter()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String, DependencyKind)> for RootDependencies {
    fn from_iter<I: IntoIterator<Item = (String, String, DependencyKind)>>(iter: I) -> Self {
        let mut deps = Self::new();
        for (name, range, kind) in iter {
            deps.push(name, range, kind);
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name_version() {
        assert_eq!(split_name_version("lodash@4.17.21"), Some(("lodash", "4.17.21")));
        assert_eq!(
            split_name_version("@babel/core@7.0.0"),
            Some(("@babel/core", "7.0.0"))
        );
        assert_eq!(split_name_version("@babel/core"), None);
        assert_eq!(split_name_version("left-pad"), None);
    }

    #[test]
    fn test_insert_keeps_first_key() {
        let mut data = NormalizedLockData::new(LockFormat::NpmFlat);
        assert!(data.insert(LockEntry::new("node_modules/a", "a", "1.0.0", Hierarchy::top_level())));
        assert!(!data.insert(LockEntry::new("node_modules/a", "a", "2.0.0", Hierarchy::top_level())));

        assert_eq!(data.len(), 1);
        assert_eq!(data.get("node_modules/a").unwrap().version, "1.0.0");
    }

    #[test]
    fn test_entries_named_preserves_order() {
        let mut data = NormalizedLockData::new(LockFormat::NpmFlat);
        data.insert(LockEntry::new(
            "node_modules/x/node_modules/a",
            "a",
            "2.0.0",
            Hierarchy::Nested(vec!["x".into()]),
        ));
        data.insert(LockEntry::new("node_modules/a", "a", "1.0.0", Hierarchy::top_level()));
        data.insert(LockEntry::new("node_modules/b", "b", "1.0.0", Hierarchy::top_level()));

        let versions: Vec<_> = data.entries_named("a").map(|e| e.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0.0", "1.0.0"]);
        assert_eq!(data.entries_named("missing").count(), 0);
    }

    #[test]
    fn test_aliased_entry_is_listed_under_alias() {
        let mut data = NormalizedLockData::new(LockFormat::NpmFlat);
        let mut entry = LockEntry::new(
            "node_modules/string-width-cjs",
            "string-width",
            "4.2.3",
            Hierarchy::top_level(),
        );
        entry.set_alias("string-width-cjs");
        data.insert(entry);

        let found = data.entries_named("string-width-cjs").next().unwrap();
        assert_eq!(found.name, "string-width");
        assert_eq!(found.lookup_name(), "string-width-cjs");
        assert_eq!(data.entries_named("string-width").count(), 0);
    }

    #[test]
    fn test_register_alias_shares_entry() {
        let mut data = NormalizedLockData::new(LockFormat::Pnpm);
        data.insert(LockEntry::new("string-width@4.2.3", "string-width", "4.2.3", Hierarchy::Flat));

        assert!(data.register_alias("string-width-cjs", "string-width@4.2.3"));
        assert!(data.register_alias("string-width-cjs", "string-width@4.2.3"));
        assert!(!data.register_alias("other", "missing@1.0.0"));

        assert_eq!(data.entries_named("string-width-cjs").count(), 1);
        assert_eq!(data.entries_named("string-width").count(), 1);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_set_alias_ignores_own_name() {
        let mut entry = LockEntry::new("node_modules/a", "a", "1.0.0", Hierarchy::top_level());
        entry.set_alias("a");
        assert_eq!(entry.alias, None);
        assert_eq!(entry.lookup_name(), "a");
    }

    #[test]
    fn test_hierarchy_nesting() {
        let nested = Hierarchy::Nested(vec!["a".into(), "b".into()]);
        assert!(nested.is_nested_under("b"));
        assert!(!nested.is_nested_under("a"));
        assert!(!nested.is_shared());
        assert!(Hierarchy::top_level().is_shared());
        assert!(Hierarchy::Unknown.is_shared());
        assert!(!Hierarchy::Flat.is_nested_under("a"));
    }

    #[test]
    fn test_root_dependencies_first_declaration_wins() {
        let mut deps = RootDependencies::new();
        deps.push("react", "^18.0.0", DependencyKind::Production);
        deps.push("react", "^17.0.0", DependencyKind::Development);
        deps.push("vitest", "^1.0.0", DependencyKind::Development);

        let collected: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.is_dev())).collect();
        assert_eq!(collected, vec![("react", false), ("vitest", true)]);
    }

    #[test]
    fn test_root_dependencies_from_importer() {
        let mut importer = Importer::new(".");
        importer.push(ImporterDependency {
            name: "typescript".into(),
            specifier: "^5.0.0".into(),
            version: Some("5.4.2".into()),
            kind: DependencyKind::Development,
        });
        importer.push(ImporterDependency {
            name: "react".into(),
            specifier: "^18.0.0".into(),
            version: Some("18.2.0".into()),
            kind: DependencyKind::Production,
        });

        let all = RootDependencies::from_importer(&importer, true);
        let names: Vec<_> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["react", "typescript"]);

        let prod = RootDependencies::from_importer(&importer, false);
        assert_eq!(prod.len(), 1);
        assert_eq!(importer.resolved_version("react"), Some("18.2.0"));
    }

    #[test]
    fn test_format_id_matches_serde() {
        for format in LockFormat::all() {
            let serialized = serde_json::to_value(format).unwrap();
            assert_eq!(serialized, format.id());
        }
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            LockFormat::detect("package-lock.json", r#"{"lockfileVersion": 1}"#).unwrap(),
            LockFormat::NpmNested
        );
        assert_eq!(
            LockFormat::detect("package-lock.json", r#"{"name": "app"}"#).unwrap(),
            LockFormat::NpmNested
        );
        assert_eq!(
            LockFormat::detect("npm-shrinkwrap.json", r#"{"lockfileVersion": 3}"#).unwrap(),
            LockFormat::NpmFlat
        );
        assert_eq!(LockFormat::detect("yarn.lock", "").unwrap(), LockFormat::Yarn);
        assert_eq!(LockFormat::detect("pnpm-lock.yaml", "").unwrap(), LockFormat::Pnpm);
        assert_eq!(LockFormat::detect("bun.lock", "").unwrap(), LockFormat::Bun);
        assert!(matches!(
            LockFormat::detect("Cargo.lock", ""),
            Err(crate::Error::UnsupportedLockfile { .. })
        ));
        assert!(matches!(
            LockFormat::detect("package-lock.json", "{"),
            Err(crate::Error::Parse { .. })
        ));
    }
}
