//! Dotted version strings with open-ended wildcard tails.
//!
//! Client rule evaluators compare versions against literals like `'83.!'`
//! (this major or later within the bound) and `'95.*'` (up to and including
//! this major). Both markers parse to the same sentinel — [`VersionTail::Any`]
//! — and only diverge again when a version is rendered as a lower or upper
//! bound literal.
//!
//! The empty string is the NO_VERSION sentinel: it is "absent", not
//! "version 0", and parses to `Ok(None)` so the corresponding targeting
//! clause is omitted entirely.

use std::fmt;

use crate::error::TargetingError;

/// The minor or patch component of a [`Version`].
///
/// `Any` is the open-ended wildcard: it matches any value in its position and
/// every position below it. It orders below `Exact(0)`, so `98.!` compares as
/// the bottom of major 98 (the same result the original reaches by resolving
/// `!` to `0` before comparing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionTail {
    Any,
    Exact(u32),
}

/// A parsed `major.minor.patch` version.
///
/// Ordering is lexicographic over `(major, minor, patch)`; see
/// [`VersionTail`] for how wildcards compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: VersionTail,
    pub patch: VersionTail,
}

impl Version {
    /// A fully open version: `major.!` (any minor, any patch).
    pub fn open(major: u32) -> Version {
        Version { major, minor: VersionTail::Any, patch: VersionTail::Any }
    }

    /// A fully pinned version.
    pub fn exact(major: u32, minor: u32, patch: u32) -> Version {
        Version { major, minor: VersionTail::Exact(minor), patch: VersionTail::Exact(patch) }
    }

    /// Parse a dotted version string.
    ///
    /// Accepted grammar: `major[.minor[.patch]]` where each component is a
    /// non-negative integer, with `!` or `*` accepted in the minor or patch
    /// position and converted to [`VersionTail::Any`]. Missing trailing
    /// components default to `0`. A component after a wildcard is malformed
    /// (`83.!.2`), since the wildcard already claims the rest of the tail.
    ///
    /// The empty (or whitespace-only) string is the NO_VERSION sentinel and
    /// returns `Ok(None)`.
    pub fn parse(input: &str) -> Result<Option<Version>, TargetingError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let malformed = || TargetingError::MalformedVersion { input: trimmed.to_string() };

        let caps = regex!(r"^(\d+)(?:\.(\d+|[!*])(?:\.(\d+|[!*]))?)?$")
            .captures(trimmed)
            .ok_or_else(malformed)?;

        let major: u32 = caps[1].parse().map_err(|_| malformed())?;
        let minor = match caps.get(2) {
            None => VersionTail::Exact(0),
            Some(m) => parse_tail(m.as_str()).ok_or_else(malformed)?,
        };
        let patch = match caps.get(3) {
            None if minor == VersionTail::Any => VersionTail::Any,
            None => VersionTail::Exact(0),
            Some(m) => {
                // `83.!.2` claims a patch below a wildcard minor.
                if minor == VersionTail::Any {
                    return Err(malformed());
                }
                parse_tail(m.as_str()).ok_or_else(malformed)?
            }
        };

        Ok(Some(Version { major, minor, patch }))
    }

    /// The literal used when this version is a lower bound: the open tail is
    /// rendered as `!`, meaning "this prefix or later".
    pub fn min_bound_literal(&self) -> String {
        self.render('!')
    }

    /// The literal used when this version is an upper bound: the open tail is
    /// rendered as `*`, meaning "up to and including this prefix".
    pub fn max_bound_literal(&self) -> String {
        self.render('*')
    }

    fn render(&self, wildcard: char) -> String {
        match (self.minor, self.patch) {
            (VersionTail::Any, _) => format!("{}.{}", self.major, wildcard),
            (VersionTail::Exact(minor), VersionTail::Any) => format!("{}.{}.{}", self.major, minor, wildcard),
            (VersionTail::Exact(minor), VersionTail::Exact(patch)) => {
                format!("{}.{}.{}", self.major, minor, patch)
            }
        }
    }
}

fn parse_tail(component: &str) -> Option<VersionTail> {
    match component {
        "!" | "*" => Some(VersionTail::Any),
        digits => digits.parse().ok().map(VersionTail::Exact),
    }
}

impl fmt::Display for Version {
    /// Canonical form: wildcards render as `!`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.min_bound_literal())
    }
}
