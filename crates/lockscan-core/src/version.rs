//! Version range compatibility.
//!
//! This is a deliberately simplified policy and **not** semantic versioning:
//!
//! - `^x...` matches any version whose major component is `x`
//! - `~x.y...` matches any version whose major and minor components are `x.y`
//! - anything else matches only when the strings are identical
//!
//! Ranges such as `>=1.2.0`, `1.x`, `*` or `latest` therefore only match a
//! version spelled exactly the same way. Callers must not treat a match as a
//! semver guarantee.

/// Returns true when `version` satisfies `range` under the simplified policy.
///
/// ```
/// use lockscan_core::version::satisfies;
///
/// assert!(satisfies("^1.2.0", "1.9.3"));
/// assert!(!satisfies("~1.2.0", "1.3.0"));
/// assert!(satisfies("2.0.0", "2.0.0"));
/// ```
pub fn satisfies(range: &str, version: &str) -> bool {
    let range = range.trim();
    if let Some(rest) = range.strip_prefix('^') {
        return same_prefix(rest, version, 1);
    }
    if let Some(rest) = range.strip_prefix('~') {
        return same_prefix(rest, version, 2);
    }
    range == version
}

fn same_prefix(range: &str, version: &str, count: usize) -> bool {
    match (components(range, count), components(version, count)) {
        (Some(wanted), Some(found)) => wanted == found,
        _ => false,
    }
}

/// Leading dot-separated components, `None` when fewer than `count` exist.
fn components(version: &str, count: usize) -> Option<Vec<&str>> {
    let parts: Vec<&str> = version.split('.').take(count).collect();
    if parts.len() < count || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn caret_accepts_any_version_with_the_same_major(
            major in 0u32..50,
            minor in 0u32..50,
            patch in 0u32..50,
            other_minor in 0u32..50,
            other_patch in 0u32..50
        ) {
            let range = format!("^{}.{}.{}", major, minor, patch);
            let version = format!("{}.{}.{}", major, other_minor, other_patch);
            prop_assert!(satisfies(&range, &version));
        }

        #[test]
        fn tilde_is_narrower_than_caret(
            range in r"[0-9]{1,2}\.[0-9]{1,2}\.[0-9]{1,2}",
            version in r"[0-9]{1,2}\.[0-9]{1,2}\.[0-9]{1,2}"
        ) {
            if satisfies(&format!("~{}", range), &version) {
                let caret = format!("^{}", range);
                prop_assert!(satisfies(&caret, &version));
            }
        }

        #[test]
        fn exact_versions_satisfy_themselves(
            version in r"[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}(-[a-z]{1,5})?"
        ) {
            prop_assert!(satisfies(&version, &version));
        }
    }
}
