//! Lockfile normalizer trait and the shared entry lookup policy.

use crate::error::Result;
use crate::types::{alias_target, Hierarchy, Importer, LockEntry, LockFormat, NormalizedLockData};
use crate::version::satisfies;
use std::fmt;

/// Where a lookup happens: the importer whose dependencies seed the tree and
/// the chain of ancestor names leading to the dependency being resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupContext<'a> {
    /// Importer the tree is being built for.
    pub importer: Option<&'a Importer>,
    /// Ancestor names from the root, excluding the package being looked up.
    pub path: &'a [String],
}

impl<'a> LookupContext<'a> {
    /// Context for a lookup at `path` under `importer`.
    pub fn new(importer: Option<&'a Importer>, path: &'a [String]) -> Self {
        Self { importer, path }
    }
}

/// Trait for lockfile format normalizers.
///
/// Normalizers are stateless: everything learned while parsing lives in the
/// returned [`NormalizedLockData`], and lookups receive their root context
/// explicitly. A single normalizer can serve any number of lockfiles.
///
/// # Examples
///
/// ```no_run
/// use lockscan_core::{LockfileNormalizer, LookupContext};
///
/// fn resolve(normalizer: &dyn LockfileNormalizer, content: &str) -> lockscan_core::Result<()> {
///     let data = normalizer.normalize(content)?;
///     let entry = normalizer.find_entry(&data, "react", "^18.0.0", &LookupContext::default());
///     println!("react -> {:?}", entry.map(|e| &e.version));
///     Ok(())
/// }
/// ```
pub trait LockfileNormalizer: Send + Sync + fmt::Debug {
    /// The format this normalizer understands.
    fn format(&self) -> LockFormat;

    /// Parses raw lockfile content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] when the content is not valid syntax
    /// for the format. Malformed individual records are skipped with a
    /// warning instead.
    fn normalize(&self, content: &str) -> Result<NormalizedLockData>;

    /// Locates the entry `name` resolves to for `range` at `context`.
    fn find_entry<'d>(
        &self,
        data: &'d NormalizedLockData,
        name: &str,
        range: &str,
        context: &LookupContext<'_>,
    ) -> Option<&'d LockEntry> {
        find_entry(data, name, range, context)
    }
}

/// Shared lookup policy.
///
/// In order of preference:
/// 1. at the root, the version the importer recorded for `name`
/// 2. an entry installed directly under the last ancestor in `context.path`
///    (the one whose recorded parents best match the path)
/// 3. an entry whose lockfile specifiers list `range` verbatim
/// 4. the first entry whose version satisfies `range`, shared entries
///    before nested ones
///
/// When several entries qualify at the same step the first in lockfile
/// order wins. Alias ranges (`npm:real@^1.0.0`) are matched on the range
/// after the target name; `name` stays the alias.
pub fn find_entry<'d>(
    data: &'d NormalizedLockData,
    name: &str,
    range: &str,
    context: &LookupContext<'_>,
) -> Option<&'d LockEntry> {
    let declared = range;
    let range = alias_target(range).map_or(range, |(_, target)| target);

    if context.path.is_empty() {
        if let Some(version) = context.importer.and_then(|i| i.resolved_version(name)) {
            if let Some(entry) = prefer_shared(
                data.entries_named(name)
                    .filter(|e| e.version == version || e.specifiers.iter().any(|s| s == version)),
            ) {
                return Some(entry);
            }
        }
    }

    if let Some(parent) = context.path.last() {
        let mut best: Option<(&LockEntry, usize)> = None;
        for entry in data.entries_named(name) {
            if !entry.hierarchy.is_nested_under(parent) {
                continue;
            }
            let overlap = match &entry.hierarchy {
                Hierarchy::Nested(parents) => suffix_overlap(parents, context.path),
                _ => 0,
            };
            if best.is_none_or(|(_, score)| overlap > score) {
                best = Some((entry, overlap));
            }
        }
        if let Some((entry, _)) = best {
            return Some(entry);
        }
    }

    if let Some(entry) = prefer_shared(
        data.entries_named(name)
            .filter(|e| e.specifiers.iter().any(|s| s == range || s == declared)),
    ) {
        return Some(entry);
    }

    let matching: Vec<&LockEntry> = data
        .entries_named(name)
        .filter(|e| satisfies(range, &e.version))
        .collect();
    if matching.len() > 1 {
        tracing::debug!(
            package = name,
            range,
            candidates = matching.len(),
            "ambiguous resolution, taking first match in lockfile order"
        );
    }
    prefer_shared(matching.into_iter())
}

fn prefer_shared<'d>(candidates: impl Iterator<Item = &'d LockEntry>) -> Option<&'d LockEntry> {
    let mut fallback = None;
    for entry in candidates {
        if entry.hierarchy.is_shared() {
            return Some(entry);
        }
        fallback.get_or_insert(entry);
    }
    fallback
}

/// Number of trailing elements `parents` shares with `path`.
fn suffix_overlap(parents: &[String], path: &[String]) -> usize {
    parents
        .iter()
        .rev()
        .zip(path.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}
