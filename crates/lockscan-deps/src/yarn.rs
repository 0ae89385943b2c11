//! yarn.lock (classic v1 and berry)
//!
//! Both dialects are indentation-based blocks. Classic writes fields as
//! `key "value"`, berry as `key: value`; a small line parser handles both
//! without a YAML dependency on the classic side.

use crate::split_package_spec;
use lockscan_core::{
    alias_target, Error, Hierarchy, LockEntry, LockFormat, LockfileNormalizer, NormalizedLockData,
    Result,
};

const DEPENDENCY_SECTIONS: &[&str] = &["dependencies", "optionalDependencies", "peerDependencies"];

/// Normalizer for yarn lockfiles.
///
/// Yarn records which declared ranges resolve to each package but not where
/// the package is installed, so every entry gets [`Hierarchy::Unknown`] and
/// the header ranges become the entry's specifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct YarnNormalizer;

impl YarnNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self
    }
}

impl LockfileNormalizer for YarnNormalizer {
    fn format(&self) -> LockFormat {
        LockFormat::Yarn
    }

    fn normalize(&self, content: &str) -> Result<NormalizedLockData> {
        let mut data = NormalizedLockData::new(LockFormat::Yarn);
        let mut block: Option<Block> = None;

        for (index, raw_line) in content.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = raw_line.len() - raw_line.trim_start().len();

            if indent == 0 {
                let Some(header) = trimmed.strip_suffix(':') else {
                    return Err(Error::parse(
                        LockFormat::Yarn,
                        format!("line {}: expected a block header, found `{}`", line_no, trimmed),
                    ));
                };
                if let Some(done) = block.take() {
                    done.finish(&mut data);
                }
                block = Some(Block::new(header));
                continue;
            }

            let Some(current) = block.as_mut() else {
                return Err(Error::parse(
                    LockFormat::Yarn,
                    format!("line {}: indented line before any block header", line_no),
                ));
            };
            current.line(indent, trimmed);
        }
        if let Some(done) = block.take() {
            done.finish(&mut data);
        }

        tracing::debug!(entries = data.len(), "normalized yarn lockfile");
        Ok(data)
    }
}

/// One `name@range` from a block header. Aliased specs
/// (`alias@npm:real@^1.0.0`) carry the real package name and its range.
struct HeaderSpec {
    name: String,
    target: Option<String>,
    range: String,
}

impl HeaderSpec {
    fn parse(spec: &str) -> Option<Self> {
        let (name, range) = split_package_spec(spec)?;
        let (target, range) = match alias_target(range) {
            Some((real, range)) => (Some(real.to_string()), range),
            None => (None, strip_protocol(range)),
        };
        Some(Self {
            name: name.to_string(),
            target,
            range: range.to_string(),
        })
    }
}

/// One header block being accumulated.
struct Block {
    header: String,
    specs: Vec<HeaderSpec>,
    skip: bool,
    field_indent: Option<usize>,
    section: Option<String>,
    child_indent: Option<usize>,
    version: Option<String>,
    resolved: Option<String>,
    integrity: Option<String>,
    dependencies: Vec<(String, String)>,
}

impl Block {
    fn new(header: &str) -> Self {
        let header = header.trim().to_string();
        let skip = unquote(&header) == "__metadata";
        let specs = if skip {
            Vec::new()
        } else {
            header
                .split(',')
                .map(|spec| spec.trim().trim_matches('"'))
                .filter(|spec| !spec.is_empty())
                .filter_map(|spec| {
                    let parsed = HeaderSpec::parse(spec);
                    if parsed.is_none() {
                        tracing::warn!(spec, "ignoring malformed yarn header entry");
                    }
                    parsed
                })
                .collect()
        };
        Self {
            header,
            specs,
            skip,
            field_indent: None,
            section: None,
            child_indent: None,
            version: None,
            resolved: None,
            integrity: None,
            dependencies: Vec::new(),
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        if self.skip {
            return;
        }
        let field_indent = *self.field_indent.get_or_insert(indent);

        if indent <= field_indent {
            self.section = None;
            self.child_indent = None;
            let (key, value) = split_field(text);
            match value {
                None => self.section = Some(key.to_string()),
                Some(value) => match key {
                    "version" => self.version = Some(value.to_string()),
                    "resolved" | "resolution" => self.resolved = Some(value.to_string()),
                    "integrity" | "checksum" => self.integrity = Some(value.to_string()),
                    _ => {}
                },
            }
            return;
        }

        let Some(section) = self.section.as_deref() else {
            return;
        };
        if !DEPENDENCY_SECTIONS.contains(&section) {
            return;
        }
        // Deeper levels (dependenciesMeta and the like) carry no edges.
        if indent > *self.child_indent.get_or_insert(indent) {
            return;
        }
        if let (name, Some(range)) = split_field(text) {
            self.dependencies
                .push((name.to_string(), strip_protocol(range).to_string()));
        }
    }

    fn finish(self, data: &mut NormalizedLockData) {
        if self.skip {
            return;
        }
        let Some(first) = self.specs.first() else {
            tracing::warn!(header = %self.header, "skipping yarn block without a package spec");
            return;
        };
        let Some(version) = self.version else {
            tracing::warn!(header = %self.header, "skipping yarn block without a version");
            return;
        };

        let name = first.target.as_ref().unwrap_or(&first.name);
        let mut entry = LockEntry::new(self.header.clone(), name.clone(), version, Hierarchy::Unknown);
        entry.set_alias(first.name.clone());
        entry.resolved_url = self.resolved;
        entry.integrity = self.integrity;
        for spec in &self.specs {
            if spec.name == first.name && !entry.specifiers.contains(&spec.range) {
                entry.specifiers.push(spec.range.clone());
            }
        }
        for (dep, range) in self.dependencies {
            entry.add_dependency(dep, range);
        }
        data.insert(entry);
    }
}

/// Splits `key "value"`, `key: value` or a bare `key:` section opener.
fn split_field(text: &str) -> (&str, Option<&str>) {
    let (key, rest) = if let Some(quoted) = text.strip_prefix('"') {
        match quoted.find('"') {
            Some(end) => (&quoted[..end], &quoted[end + 1..]),
            None => (quoted, ""),
        }
    } else {
        let end = text
            .find(|c: char| c.is_whitespace() || c == ':')
            .unwrap_or(text.len());
        (&text[..end], &text[end..])
    };

    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':').unwrap_or(rest).trim();
    if rest.is_empty() {
        (key, None)
    } else {
        (key, Some(unquote(rest)))
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Drops the `npm:` protocol from plain ranges. Alias ranges keep it so the
/// target name survives.
fn strip_protocol(range: &str) -> &str {
    if alias_target(range).is_some() {
        return range;
    }
    range.strip_prefix("npm:").unwrap_or(range)
}
