//! Semver parsing, npm-style range algebra, and satisfaction.
//!
//! `Version` is re-exported from the `semver` crate: its `Ord` impl
//! already implements the precedence rules needed here (numeric
//! prerelease ids compare numerically, alphanumeric lexicographically,
//! numeric < alphanumeric, no-prerelease > any-prerelease of the same
//! core triple). Range parsing and matching are hand-written on top of
//! it because `semver::VersionReq` doesn't speak npm's grammar
//! (caret/tilde zero-major rules, hyphen ranges, OR via `||`).

pub mod comparators;
pub mod parser;

pub use comparators::{Clause, Comparator, Range};
pub use semver::Version;
use std::cmp::Ordering;

pub use pacm_error::NpmError;

/// Parse a single version string. Tolerates a leading `v`.
pub fn parse(v: &str) -> Result<Version, NpmError> {
    parser::parse_version(v)
}

/// Parse an npm-style range expression.
pub fn parse_range(r: &str) -> Result<Range, NpmError> {
    parser::parse_range(r)
}

/// Does `version` satisfy `range`?
#[must_use]
pub fn satisfies(version: &Version, range: &Range) -> bool {
    range.matches(version)
}

/// Compare two versions to total order.
#[must_use]
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

/// The highest version in `versions` that satisfies `range`, or `None`.
/// Ties cannot occur (versions are unique within one candidate set).
#[must_use]
pub fn max_satisfying<'a>(versions: impl IntoIterator<Item = &'a Version>, range: &Range) -> Option<&'a Version> {
    versions
        .into_iter()
        .filter(|v| satisfies(v, range))
        .max_by(|a, b| a.cmp(b))
}

/// The lowest version in `versions` that satisfies `range`, or `None`.
#[must_use]
pub fn min_satisfying<'a>(versions: impl IntoIterator<Item = &'a Version>, range: &Range) -> Option<&'a Version> {
    versions
        .into_iter()
        .filter(|v| satisfies(v, range))
        .min_by(|a, b| a.cmp(b))
}

/// Is `range` just a fully-specified exact version string (no operator,
/// no wildcard segment)? Used by the resolver to skip the registry's
/// version list when a caller pins an exact version it already knows
/// is published.
#[must_use]
pub fn as_exact_version(range: &str) -> Option<Version> {
    parser::as_exact_version(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        parse(s).expect("valid version")
    }

    fn r(s: &str) -> Range {
        parse_range(s).expect("valid range")
    }

    #[test]
    fn caret_on_nonzero_major() {
        let range = r("^1.2.3");
        assert!(satisfies(&v("1.2.3"), &range));
        assert!(satisfies(&v("1.9.9"), &range));
        assert!(!satisfies(&v("2.0.0"), &range));
        assert!(!satisfies(&v("1.2.2"), &range));
    }

    #[test]
    fn caret_on_zero_major_locks_minor() {
        let range = r("^0.2.3");
        assert!(satisfies(&v("0.2.9"), &range));
        assert!(!satisfies(&v("0.3.0"), &range));
    }

    #[test]
    fn caret_on_zero_major_zero_minor_locks_patch() {
        let range = r("^0.0.3");
        assert!(satisfies(&v("0.0.3"), &range));
        assert!(!satisfies(&v("0.0.4"), &range));
    }

    #[test]
    fn tilde_locks_minor() {
        let range = r("~1.2.3");
        assert!(satisfies(&v("1.2.9"), &range));
        assert!(!satisfies(&v("1.3.0"), &range));
    }

    #[test]
    fn wildcard_matches_any_stable() {
        let range = r("*");
        assert!(satisfies(&v("0.0.1"), &range));
        assert!(satisfies(&v("99.1.2"), &range));
    }

    #[test]
    fn prerelease_excluded_from_bare_wildcard() {
        let range = r("*");
        assert!(!satisfies(&v("1.0.0-alpha"), &range));
    }

    #[test]
    fn prerelease_included_when_same_tuple_opted_in() {
        let range = r("^1.2.3-alpha.1");
        assert!(satisfies(&v("1.2.3-alpha.2"), &range));
        assert!(!satisfies(&v("1.2.4-alpha.1"), &range));
    }

    #[test]
    fn or_logic_across_clauses() {
        let range = r("1.x || 2.x");
        assert!(satisfies(&v("1.5.0"), &range));
        assert!(satisfies(&v("2.0.0"), &range));
        assert!(!satisfies(&v("3.0.0"), &range));
    }

    #[test]
    fn xrange_wildcards() {
        let range = r("1.2.x");
        assert!(satisfies(&v("1.2.0"), &range));
        assert!(satisfies(&v("1.2.99"), &range));
        assert!(!satisfies(&v("1.3.0"), &range));

        let range = r("1.x");
        assert!(satisfies(&v("1.0.0"), &range));
        assert!(satisfies(&v("1.9.9"), &range));
        assert!(!satisfies(&v("2.0.0"), &range));
    }

    #[test]
    fn hyphen_range() {
        let range = r("1.2.3 - 2.3.4");
        assert!(satisfies(&v("1.2.3"), &range));
        assert!(satisfies(&v("2.3.4"), &range));
        assert!(!satisfies(&v("2.3.5"), &range));
        assert!(!satisfies(&v("1.2.2"), &range));
    }

    #[test]
    fn hyphen_range_partial_upper() {
        let range = r("1.2 - 2.3");
        assert!(satisfies(&v("2.3.9"), &range));
        assert!(!satisfies(&v("2.4.0"), &range));
    }

    #[test]
    fn max_satisfying_prefers_stable_over_prerelease() {
        let versions = vec![v("1.0.0-alpha"), v("1.0.0-beta"), v("1.0.0")];
        let range = r("*");
        let picked = max_satisfying(versions.iter(), &range).expect("some match");
        assert_eq!(picked, &v("1.0.0"));
    }

    #[test]
    fn max_satisfying_picks_highest() {
        let versions = vec![v("4.17.19"), v("4.17.20"), v("4.17.21")];
        let range = r("^4.17.0");
        let picked = max_satisfying(versions.iter(), &range).expect("some match");
        assert_eq!(picked, &v("4.17.21"));
    }

    #[test]
    fn exact_version_matches_only_itself() {
        let range = r("1.2.3");
        assert!(satisfies(&v("1.2.3"), &range));
        assert!(!satisfies(&v("1.2.4"), &range));
    }

    #[test]
    fn as_exact_version_detects_pinned_versions() {
        assert!(as_exact_version("1.2.3").is_some());
        assert!(as_exact_version("^1.2.3").is_none());
        assert!(as_exact_version("1.2.x").is_none());
    }

    #[test]
    fn compare_orders_versions() {
        assert_eq!(compare(&v("1.0.0"), &v("2.0.0")), Ordering::Less);
        assert_eq!(compare(&v("1.0.0"), &v("1.0.0")), Ordering::Equal);
        assert_eq!(compare(&v("1.0.0"), &v("1.0.0-alpha")), Ordering::Greater);
    }

    #[test]
    fn empty_range_expression_is_invalid() {
        assert!(parse_range("").is_err());
    }
}
