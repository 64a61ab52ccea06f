//! Semver range handling.
//!
//! Ranges arrive as opaque strings from specifiers and skill manifests,
//! in npm's grammar: compound ranges are space-separated (`>=1.2 <2`),
//! which the semver crate rejects, so they are normalised to the
//! comma-joined form before parsing. `*`, the empty string, and `latest`
//! all mean "highest". Invalid candidate version strings are dropped
//! silently; they are never shown to the user as candidates.

use semver::{Version, VersionReq};

/// Parse a range string into a requirement. `*`, `""`, and `latest` all
/// accept everything.
pub fn parse_range(range: &str) -> Option<VersionReq> {
    let trimmed = range.trim();
    if trimmed.is_empty() || trimmed == "*" || trimmed == "latest" {
        return Some(VersionReq::STAR);
    }
    normalize_range(trimmed).parse().ok()
}

/// Convert npm-style space-separated compound ranges (`>=1.2 <2`, or with
/// a detached operator `>= 1.2 < 2`) to the comma-joined form the semver
/// crate parses (`>=1.2, <2`). Comma-joined and single-comparator ranges
/// pass through unchanged.
fn normalize_range(range: &str) -> String {
    if range.contains(',') {
        return range.to_string();
    }
    let parts: Vec<&str> = range.split_whitespace().collect();
    if parts.len() < 2 {
        return range.to_string();
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut i = 0;
    while i < parts.len() {
        let part = parts[i];
        let is_bare_operator = matches!(part, ">=" | "<=" | ">" | "<" | "=" | "^" | "~");
        if is_bare_operator && i + 1 < parts.len() {
            comparators.push(format!("{}{}", part, parts[i + 1]));
            i += 2;
        } else {
            comparators.push(part.to_string());
            i += 1;
        }
    }
    comparators.join(", ")
}

/// Parse and sort candidate versions, strictly descending. Invalid
/// strings are skipped.
pub fn sorted_versions(versions: &[String]) -> Vec<Version> {
    let mut parsed: Vec<Version> = versions.iter().filter_map(|v| v.parse().ok()).collect();
    parsed.sort_by(|a, b| b.cmp(a));
    parsed
}

/// Highest valid version satisfying a single range, if any.
pub fn resolve(range: &str, versions: &[String]) -> Option<Version> {
    find_highest_satisfying(&[range.to_string()], versions)
}

/// Highest version satisfying *every* range simultaneously. `None` when
/// the ranges are jointly unsatisfiable (or any range is unparsable).
pub fn find_highest_satisfying(ranges: &[String], versions: &[String]) -> Option<Version> {
    let reqs: Option<Vec<VersionReq>> = ranges.iter().map(|r| parse_range(r)).collect();
    let reqs = reqs?;

    sorted_versions(versions)
        .into_iter()
        .find(|v| reqs.iter().all(|req| req.matches(v)))
}

/// Whether any version in the candidate set satisfies every range. Used
/// by the resolver to shortcut before hitting the registry.
pub fn intersects(ranges: &[String], versions: &[String]) -> bool {
    find_highest_satisfying(ranges, versions).is_some()
}
