//! Version algebra (C1): semantic version parsing and constraint satisfaction.
//!
//! [`Version`] wraps [`semver::Version`] so equality/ordering follow semver
//! rules (build metadata ignored) without re-deriving them by hand.
//! [`VersionConstraint`] implements the fixed operator grammar plugins may
//! declare: `=`, `>=`, `>`, `<=`, `<`, `^`, `~`, `*`. `semver::VersionReq` is
//! intentionally not used for constraint parsing: its grammar is a superset
//! (comma-separated ranges, etc.) of what is accepted here.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing versions or constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    #[error("invalid version constraint '{0}'")]
    InvalidConstraint(String),
}

/// A semantic version: `major.minor.patch` with optional prerelease and
/// build metadata. Equality and ordering ignore build metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(semver::Version);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version(semver::Version::new(major, minor, patch))
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        semver::Version::parse(input)
            .map(Version)
            .map_err(|_| VersionError::InvalidVersion(input.to_string()))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// True when `self` and `other` share `major.minor.patch` (ignoring
    /// prerelease/build tags) — used to gate prerelease matching.
    fn same_triple(&self, other: &Version) -> bool {
        self.major() == other.major() && self.minor() == other.minor() && self.patch() == other.patch()
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

/// The constraint operators a plugin dependency may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
    Caret,
    Tilde,
    Wildcard,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Lt => "<",
            Operator::Caret => "^",
            Operator::Tilde => "~",
            Operator::Wildcard => "*",
        };
        write!(f, "{}", s)
    }
}

/// `{ operator, version }`. `version` is a dummy `0.0.0` for `Wildcard`,
/// which never reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    operator: Operator,
    version: Version,
    raw: String,
}

impl VersionConstraint {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed == "*" {
            return Ok(VersionConstraint {
                operator: Operator::Wildcard,
                version: Version::new(0, 0, 0),
                raw: trimmed.to_string(),
            });
        }

        let (operator, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            (Operator::Gte, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (Operator::Lte, rest)
        } else if let Some(rest) = trimmed.strip_prefix('^') {
            (Operator::Caret, rest)
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            (Operator::Tilde, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (Operator::Gt, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (Operator::Lt, rest)
        } else if let Some(rest) = trimmed.strip_prefix('=') {
            (Operator::Eq, rest)
        } else {
            (Operator::Eq, trimmed)
        };

        let version = Version::parse(rest.trim())
            .map_err(|_| VersionError::InvalidConstraint(input.to_string()))?;

        Ok(VersionConstraint {
            operator,
            version,
            raw: trimmed.to_string(),
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Pure satisfaction check: no I/O, total over all valid `(constraint,
    /// version)` pairs.
    pub fn satisfies(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Eq => candidate == &self.version,
            Operator::Wildcard => true,
            Operator::Gte | Operator::Gt | Operator::Lte | Operator::Lt => {
                if !self.prerelease_allowed(candidate) {
                    return false;
                }
                match self.operator {
                    Operator::Gte => candidate >= &self.version,
                    Operator::Gt => candidate > &self.version,
                    Operator::Lte => candidate <= &self.version,
                    Operator::Lt => candidate < &self.version,
                    _ => unreachable!(),
                }
            }
            Operator::Caret => {
                if !self.prerelease_allowed(candidate) {
                    return false;
                }
                let upper = caret_upper_bound(&self.version);
                candidate >= &self.version && candidate < &upper
            }
            Operator::Tilde => {
                if !self.prerelease_allowed(candidate) {
                    return false;
                }
                let upper = Version::new(self.version.major(), self.version.minor() + 1, 0);
                candidate >= &self.version && candidate < &upper
            }
        }
    }

    /// Prereleases only satisfy non-exact, non-wildcard constraints when
    /// both sides are prereleases of the same `major.minor.patch` — a
    /// prerelease candidate against a non-prerelease bound never satisfies,
    /// even when the triples match.
    fn prerelease_allowed(&self, candidate: &Version) -> bool {
        if !candidate.is_prerelease() {
            return true;
        }
        self.version.is_prerelease() && candidate.same_triple(&self.version)
    }
}

fn caret_upper_bound(base: &Version) -> Version {
    if base.major() != 0 {
        Version::new(base.major() + 1, 0, 0)
    } else if base.minor() != 0 {
        Version::new(0, base.minor() + 1, 0)
    } else {
        Version::new(0, 0, base.patch() + 1)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

/// Returns the maximal version in `available` satisfying `constraint`, if any.
pub fn pick_highest<'a>(available: &'a [Version], constraint: &VersionConstraint) -> Option<&'a Version> {
    available.iter().filter(|v| constraint.satisfies(v)).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_triple_as_exact() {
        let c = VersionConstraint::parse("1.2.3").unwrap();
        assert_eq!(c.operator(), Operator::Eq);
        assert!(c.satisfies(&Version::new(1, 2, 3)));
        assert!(!c.satisfies(&Version::new(1, 2, 4)));
    }

    #[test]
    fn caret_locks_major_for_nonzero() {
        let c = VersionConstraint::parse("^1.2.3").unwrap();
        assert!(c.satisfies(&Version::new(1, 2, 3)));
        assert!(c.satisfies(&Version::new(1, 9, 0)));
        assert!(!c.satisfies(&Version::new(2, 0, 0)));
        assert!(!c.satisfies(&Version::new(1, 2, 2)));
    }

    #[test]
    fn caret_locks_minor_for_zero_major() {
        let c = VersionConstraint::parse("^0.2.3").unwrap();
        assert!(c.satisfies(&Version::new(0, 2, 3)));
        assert!(c.satisfies(&Version::new(0, 2, 9)));
        assert!(!c.satisfies(&Version::new(0, 3, 0)));
    }

    #[test]
    fn caret_locks_patch_for_zero_major_minor() {
        let c = VersionConstraint::parse("^0.0.3").unwrap();
        assert!(c.satisfies(&Version::new(0, 0, 3)));
        assert!(!c.satisfies(&Version::new(0, 0, 4)));
    }

    #[test]
    fn tilde_locks_minor() {
        let c = VersionConstraint::parse("~1.2.3").unwrap();
        assert!(c.satisfies(&Version::new(1, 2, 9)));
        assert!(!c.satisfies(&Version::new(1, 3, 0)));
    }

    #[test]
    fn wildcard_matches_anything() {
        let c = VersionConstraint::parse("*").unwrap();
        assert!(c.satisfies(&Version::new(0, 0, 1)));
        assert!(c.satisfies(&Version::new(99, 1, 1)));
    }

    #[test]
    fn range_operators() {
        assert!(VersionConstraint::parse(">=1.0.0").unwrap().satisfies(&Version::new(1, 0, 0)));
        assert!(!VersionConstraint::parse(">1.0.0").unwrap().satisfies(&Version::new(1, 0, 0)));
        assert!(VersionConstraint::parse("<=1.0.0").unwrap().satisfies(&Version::new(1, 0, 0)));
        assert!(!VersionConstraint::parse("<1.0.0").unwrap().satisfies(&Version::new(1, 0, 0)));
    }

    #[test]
    fn prerelease_excluded_from_range_unless_same_triple() {
        let c = VersionConstraint::parse("^1.2.3").unwrap();
        let pre = Version::parse("1.2.3-alpha.1").unwrap();
        assert!(!c.satisfies(&pre));

        let exact = VersionConstraint::parse("1.2.3-alpha.1").unwrap();
        assert!(exact.satisfies(&pre));
    }

    #[test]
    fn prerelease_excluded_from_non_prerelease_bound_even_at_same_triple() {
        // `<=1.2.3`/`<1.2.3` aren't prerelease constraints, so a prerelease
        // candidate at the same triple must not satisfy them even though the
        // ordering check alone (candidate <= 1.2.3) would pass.
        let pre = Version::parse("1.2.3-alpha.1").unwrap();
        assert!(!VersionConstraint::parse("<=1.2.3").unwrap().satisfies(&pre));
        assert!(!VersionConstraint::parse("<1.2.3").unwrap().satisfies(&pre));
    }

    #[test]
    fn pick_highest_returns_max_satisfying() {
        let versions = vec![
            Version::new(1, 0, 0),
            Version::new(1, 4, 0),
            Version::new(1, 9, 9),
            Version::new(2, 0, 0),
        ];
        let c = VersionConstraint::parse("^1.0.0").unwrap();
        assert_eq!(pick_highest(&versions, &c), Some(&Version::new(1, 9, 9)));
    }

    #[test]
    fn pick_highest_none_when_unsatisfiable() {
        let versions = vec![Version::new(1, 0, 0)];
        let c = VersionConstraint::parse("^2.0.0").unwrap();
        assert_eq!(pick_highest(&versions, &c), None);
    }

    #[test]
    fn invalid_inputs_error_without_panicking() {
        assert!(Version::parse("not-a-version").is_err());
        assert!(VersionConstraint::parse("^not-a-version").is_err());
    }
}
