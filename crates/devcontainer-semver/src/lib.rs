//! Minimal semver parsing and partial-version constraint matching.
//!
//! The resolver's version-resolution stage (`1` -> highest `1.*.*`, `1.0` ->
//! highest `1.0.*`, anything else -> exact match) needs nothing beyond
//! `major.minor.patch` comparison, so this is a small purpose-built parser
//! rather than a pull of the full `semver` crate's range grammar.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let mut parts = s.splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch_part = parts.next()?;
        // Tolerate a build/prerelease suffix like "3-alpha" by truncating at
        // the first non-digit; reject it outright if there are no digits.
        let digits: String = patch_part.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let patch = digits.parse().ok()?;
        Some(Version { major, minor, patch })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A version constraint as it appears in a Feature identifier's tag: either
/// fully pinned, or partial (major-only / major.minor-only), which selects
/// the highest published version within that prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Exact(Version),
    Major(u64),
    MajorMinor(u64, u64),
}

impl Constraint {
    /// Parse a (possibly partial) version string into a constraint.
    /// `"1"` -> `Major(1)`, `"1.0"` -> `MajorMinor(1, 0)`, `"1.2.3"` ->
    /// `Exact`. Anything that doesn't parse as dot-separated integers is
    /// rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [major] => Some(Constraint::Major(major.parse().ok()?)),
            [major, minor] => {
                Some(Constraint::MajorMinor(major.parse().ok()?, minor.parse().ok()?))
            }
            [major, minor, patch] => Some(Constraint::Exact(Version {
                major: major.parse().ok()?,
                minor: minor.parse().ok()?,
                patch: {
                    let digits: String =
                        patch.chars().take_while(|c| c.is_ascii_digit()).collect();
                    if digits.is_empty() {
                        return None;
                    }
                    digits.parse().ok()?
                },
            })),
            _ => None,
        }
    }

    pub fn matches(&self, v: &Version) -> bool {
        match self {
            Constraint::Exact(exact) => v == exact,
            Constraint::Major(major) => v.major == *major,
            Constraint::MajorMinor(major, minor) => v.major == *major && v.minor == *minor,
        }
    }
}

/// Parse every tag in `tags` as a [`Version`] (silently skipping tags that
/// aren't valid semver, e.g. `latest` or `dev`) and return the highest one
/// matching `constraint`.
pub fn highest_matching(tags: &[String], constraint: &Constraint) -> Option<Version> {
    tags.iter()
        .filter_map(|t| Version::parse(t))
        .filter(|v| constraint.matches(v))
        .max_by(|a, b| a.cmp(b))
}

/// Highest of all parseable versions in `tags`, ignoring constraint.
pub fn highest(tags: &[String]) -> Option<Version> {
    tags.iter().filter_map(|t| Version::parse(t)).max()
}

/// `Ordering` convenience for callers that already hold two `Version`s.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}
