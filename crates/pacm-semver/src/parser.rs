use semver::{Prerelease, Version};

use crate::comparators::{Clause, Comparator};

/// A version where any trailing `major.minor.patch` component may be
/// absent (wildcarded), e.g. `1`, `1.2`, `1.x`, `1.2.x`.
#[derive(Debug, Clone, Copy)]
pub struct PartialVersion {
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
}

impl PartialVersion {
    fn floor(self) -> Version {
        Version::new(self.major, self.minor.unwrap_or(0), self.patch.unwrap_or(0))
    }
}

fn is_wildcard_token(s: &str) -> bool {
    matches!(s, "x" | "X" | "*" | "")
}

/// Parse a dotted version-ish token into major/minor/patch/prerelease,
/// tolerating missing trailing segments and `x`/`X`/`*` wildcard segments.
/// Returns `None` only for tokens that aren't version-shaped at all.
fn parse_partial(token: &str) -> Result<(PartialVersion, Option<Prerelease>), pacm_error::NpmError> {
    let token = token.trim().trim_start_matches(['v', 'V']);
    if token.is_empty() || is_wildcard_token(token) {
        return Ok((
            PartialVersion { major: 0, minor: None, patch: None },
            None,
        ));
    }

    let (core, pre) = match token.split_once('-') {
        Some((c, p)) => (c, Some(p)),
        None => (token, None),
    };
    // Build metadata (after `+`) is ignored entirely.
    let core = core.split('+').next().unwrap_or(core);

    let mut parts = core.split('.');
    let major_str = parts.next().unwrap_or("");
    if major_str.is_empty() || is_wildcard_token(major_str) {
        return Ok((PartialVersion { major: 0, minor: None, patch: None }, None));
    }
    let major: u64 = major_str
        .parse()
        .map_err(|_| pacm_error::NpmError::parse(format!("invalid major version segment '{major_str}'")))?;

    let minor = match parts.next() {
        None => None,
        Some(m) if is_wildcard_token(m) => None,
        Some(m) => Some(
            m.parse::<u64>()
                .map_err(|_| pacm_error::NpmError::parse(format!("invalid minor version segment '{m}'")))?,
        ),
    };

    let patch = match parts.next() {
        None => None,
        Some(p) if is_wildcard_token(p) => None,
        Some(p) => Some(
            p.parse::<u64>()
                .map_err(|_| pacm_error::NpmError::parse(format!("invalid patch version segment '{p}'")))?,
        ),
    };

    let prerelease = match pre {
        Some(p) if !p.is_empty() => {
            Some(Prerelease::new(p).map_err(|e| pacm_error::NpmError::parse(e.to_string()))?)
        }
        _ => None,
    };

    Ok((PartialVersion { major, minor, patch }, prerelease))
}

/// Parse a fully-specified version string. Tolerates
/// a leading `v`.
pub fn parse_version(input: &str) -> Result<Version, pacm_error::NpmError> {
    let trimmed = input.trim().trim_start_matches(['v', 'V']);
    Version::parse(trimmed).map_err(|e| pacm_error::NpmError::parse(format!("invalid version '{input}': {e}")))
}

fn exact_with_prerelease(pv: PartialVersion, pre: Option<Prerelease>) -> Version {
    let mut v = pv.floor();
    if let Some(p) = pre {
        v.pre = p;
    }
    v
}

fn caret_bounds(pv: PartialVersion) -> (Version, Version) {
    let lower = pv.floor();
    let upper = match (pv.minor, pv.patch) {
        (None, None) => Version::new(pv.major + 1, 0, 0),
        (Some(m), None) => {
            if pv.major > 0 {
                Version::new(pv.major + 1, 0, 0)
            } else if m > 0 {
                Version::new(0, m + 1, 0)
            } else {
                Version::new(0, 1, 0)
            }
        }
        (Some(m), Some(p)) => {
            if pv.major > 0 {
                Version::new(pv.major + 1, 0, 0)
            } else if m > 0 {
                Version::new(0, m + 1, 0)
            } else {
                Version::new(0, 0, p + 1)
            }
        }
        (None, Some(_)) => Version::new(pv.major + 1, 0, 0),
    };
    (lower, upper)
}

fn tilde_bounds(pv: PartialVersion) -> (Version, Version) {
    let lower = pv.floor();
    let upper = match pv.minor {
        None => Version::new(pv.major + 1, 0, 0),
        Some(m) => Version::new(pv.major, m + 1, 0),
    };
    (lower, upper)
}

/// `pv` always has a concrete `major` here (a bare top-level `*`/`x` is
/// short-circuited by the caller before this runs). `None` means the
/// version was fully specified and should be matched exactly instead.
fn xrange_bounds(pv: PartialVersion) -> Option<(Version, Version)> {
    match (pv.minor, pv.patch) {
        (None, None) => Some((Version::new(pv.major, 0, 0), Version::new(pv.major + 1, 0, 0))),
        (Some(m), None) => Some((Version::new(pv.major, m, 0), Version::new(pv.major, m + 1, 0))),
        (Some(_), Some(_)) => None, // fully specified, caller handles as exact
        (None, Some(_)) => None,
    }
}

/// Scan one comparator atom (`>=1.2.3`, `^1.x`, `1.2`, ...) off the front
/// of `remaining`, returning the built comparator(s) and the unconsumed
/// rest of the string.
fn parse_atom(remaining: &str) -> Result<(Vec<Comparator>, &str), pacm_error::NpmError> {
    let remaining = remaining.trim_start();

    let (op, rest) = if let Some(r) = remaining.strip_prefix(">=") {
        (">=", r)
    } else if let Some(r) = remaining.strip_prefix("<=") {
        ("<=", r)
    } else if let Some(r) = remaining.strip_prefix('>') {
        (">", r)
    } else if let Some(r) = remaining.strip_prefix('<') {
        ("<", r)
    } else if let Some(r) = remaining.strip_prefix('^') {
        ("^", r)
    } else if let Some(r) = remaining.strip_prefix('~') {
        ("~", r)
    } else if let Some(r) = remaining.strip_prefix('=') {
        ("=", r)
    } else {
        ("", remaining)
    };

    let rest = rest.trim_start();
    let mut end = 0;
    let bytes = rest.as_bytes();
    while end < bytes.len() {
        let c = bytes[end] as char;
        if c.is_whitespace() {
            break;
        }
        end += 1;
    }
    let token = &rest[..end];
    let next = &rest[end..];

    if token.is_empty() && op.is_empty() {
        return Err(pacm_error::NpmError::parse("expected version but found end of input"));
    }

    let (pv, pre) = parse_partial(token)?;
    let comparators = match op {
        ">=" => vec![Comparator::GreaterThanOrEqual(exact_with_prerelease(pv, pre))],
        "<=" => vec![Comparator::LessThanOrEqual(exact_with_prerelease(pv, pre))],
        ">" => vec![Comparator::GreaterThan(exact_with_prerelease(pv, pre))],
        "<" => vec![Comparator::LessThan(exact_with_prerelease(pv, pre))],
        "^" => {
            let (lo, hi) = caret_bounds(pv);
            let mut lo = lo;
            if let Some(p) = pre {
                lo.pre = p;
            }
            vec![
                Comparator::GreaterThanOrEqual(lo),
                Comparator::LessThan(hi),
            ]
        }
        "~" => {
            let (lo, hi) = tilde_bounds(pv);
            let mut lo = lo;
            if let Some(p) = pre {
                lo.pre = p;
            }
            vec![
                Comparator::GreaterThanOrEqual(lo),
                Comparator::LessThan(hi),
            ]
        }
        "=" | "" => {
            if token.is_empty() || is_wildcard_token(token) {
                vec![Comparator::Wildcard]
            } else if let Some((lo, hi)) = xrange_bounds(pv) {
                vec![
                    Comparator::GreaterThanOrEqual(lo),
                    Comparator::LessThan(hi),
                ]
            } else {
                vec![Comparator::Exact(exact_with_prerelease(pv, pre))]
            }
        }
        _ => unreachable!("all prefix branches covered"),
    };

    Ok((comparators, next))
}

fn parse_clause(clause: &str) -> Result<Clause, pacm_error::NpmError> {
    let clause = clause.trim();
    if clause.is_empty() || clause == "*" || clause == "x" || clause == "X" {
        return Ok(Clause::wildcard());
    }

    // Hyphen range: "A - B"
    if let Some((a, b)) = clause.split_once(" - ") {
        let (pv_a, pre_a) = parse_partial(a.trim())?;
        let (pv_b, _pre_b) = parse_partial(b.trim())?;
        let mut lower = pv_a.floor();
        if let Some(p) = pre_a {
            lower.pre = p;
        }
        let upper = match (pv_b.minor, pv_b.patch) {
            (None, None) => Comparator::LessThan(Version::new(pv_b.major + 1, 0, 0)),
            (Some(m), None) => Comparator::LessThan(Version::new(pv_b.major, m + 1, 0)),
            (Some(m), Some(p)) => Comparator::LessThanOrEqual(Version::new(pv_b.major, m, p)),
            (None, Some(_)) => Comparator::LessThan(Version::new(pv_b.major + 1, 0, 0)),
        };
        return Ok(Clause::new(vec![Comparator::GreaterThanOrEqual(lower), upper]));
    }

    let mut comparators = Vec::new();
    let mut remaining: &str = clause;
    while !remaining.trim().is_empty() {
        let (mut atom_comparators, next) = parse_atom(remaining)?;
        comparators.append(&mut atom_comparators);
        remaining = next;
    }

    if comparators.is_empty() {
        comparators.push(Comparator::Wildcard);
    }
    Ok(Clause::new(comparators))
}

/// Parse a full npm-style range expression. An empty
/// string is invalid; use `"*"` to match every stable release.
pub fn parse_range(input: &str) -> Result<crate::comparators::Range, pacm_error::NpmError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(pacm_error::NpmError::parse("empty range expression is invalid"));
    }

    let mut clauses = Vec::new();
    for part in trimmed.split("||") {
        clauses.push(parse_clause(part)?);
    }
    Ok(crate::comparators::Range::new(clauses))
}

/// Used by [`crate::is_exact_version`] to test whether a range string is
/// itself a fully-specified version (no operator, no wildcard segment).
#[must_use]
pub fn as_exact_version(range: &str) -> Option<Version> {
    let trimmed = range.trim();
    if trimmed.is_empty() || trimmed.contains("||") || trimmed.contains(' ') {
        return None;
    }
    if trimmed.starts_with(['>', '<', '^', '~', '=']) {
        return None;
    }
    parse_version(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_version() {
        assert!(parse_version("1.2.3").is_ok());
        assert!(parse_version("v1.2.3").is_ok());
    }

    #[test]
    fn rejects_malformed_version() {
        assert!(parse_version("not-a-version").is_err());
    }
}
