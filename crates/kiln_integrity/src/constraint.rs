//! Version constraint grammar and matching.
//!
//! Supported forms: `^X.Y.Z`, `~X.Y.Z`, `>X.Y.Z`, `>=X.Y.Z`, an exact
//! `X.Y.Z` (optionally `v`-prefixed) and `==latest`. Whitespace between the
//! operator and the version is allowed. An empty constraint means latest.

use semver::Version;
use std::fmt;
use std::str::FromStr;

/// The comparison a constraint performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Exactly the given version.
    Exact,
    /// Compatible with the given version, locking the leftmost non-zero part.
    Caret,
    /// Same major and minor, patch at least the given one.
    Tilde,
    /// Strictly greater.
    Greater,
    /// Greater or equal.
    GreaterEq,
    /// Any version; the highest wins.
    Latest,
}

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    op: Op,
    version: Option<Version>,
}

/// A constraint string that does not follow the grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid constraint '{input}': {reason}")]
pub struct ConstraintError {
    /// The text that failed to parse.
    pub input: String,
    /// Why it failed.
    pub reason: String,
}

impl Constraint {
    /// The constraint used when none is written.
    pub fn latest() -> Self {
        Self {
            op: Op::Latest,
            version: None,
        }
    }

    /// Parses an optional constraint, treating `None` as latest.
    pub fn parse_optional(text: Option<&str>) -> Result<Self, ConstraintError> {
        match text {
            Some(text) => text.parse(),
            None => Ok(Self::latest()),
        }
    }

    /// The operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// The version operand, absent for latest.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Returns `true` if `candidate` satisfies this constraint.
    pub fn matches(&self, candidate: &Version) -> bool {
        let Some(base) = &self.version else {
            return true;
        };
        match self.op {
            Op::Latest => true,
            Op::Exact => candidate == base,
            Op::Greater => candidate > base,
            Op::GreaterEq => candidate >= base,
            Op::Tilde => below(candidate, base, next_minor(base.major, base.minor)),
            Op::Caret => {
                let upper = if base.major > 0 {
                    base.major.checked_add(1).map(|m| Version::new(m, 0, 0))
                } else if base.minor > 0 {
                    next_minor(0, base.minor)
                } else {
                    match base.patch.checked_add(1) {
                        Some(p) => Some(Version::new(0, 0, p)),
                        None => next_minor(0, 0),
                    }
                };
                below(candidate, base, upper)
            }
        }
    }

    /// Picks the highest version among `candidates` that satisfies this
    /// constraint. Candidates that are not valid versions are ignored.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter_map(|text| parse_version(text).ok().map(|v| (v, text)))
            .filter(|(v, _)| self.matches(v))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, text)| text)
    }
}

/// The first version after `major.minor.*`, carrying into the major when the
/// minor is `u64::MAX`. `None` when there is no such version.
fn next_minor(major: u64, minor: u64) -> Option<Version> {
    match minor.checked_add(1) {
        Some(m) => Some(Version::new(major, m, 0)),
        None => major.checked_add(1).map(|m| Version::new(m, 0, 0)),
    }
}

/// `base <= candidate < upper`, with no upper bound when `upper` is `None`.
fn below(candidate: &Version, base: &Version, upper: Option<Version>) -> bool {
    candidate >= base && upper.map_or(true, |upper| *candidate < upper)
}

/// Parses `X.Y.Z[-pre]`, accepting a leading `v` optionally followed by
/// whitespace.
pub fn parse_version(text: &str) -> Result<Version, semver::Error> {
    let text = text.trim();
    Version::parse(text.strip_prefix('v').map_or(text, str::trim_start))
}

impl FromStr for Constraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let fail = |reason: String| ConstraintError {
            input: s.to_string(),
            reason,
        };

        if text.is_empty() || text == "==latest" {
            return Ok(Self::latest());
        }

        let (op, rest) = if let Some(rest) = text.strip_prefix(">=") {
            (Op::GreaterEq, rest)
        } else if let Some(rest) = text.strip_prefix('>') {
            (Op::Greater, rest)
        } else if let Some(rest) = text.strip_prefix('^') {
            (Op::Caret, rest)
        } else if let Some(rest) = text.strip_prefix('~') {
            (Op::Tilde, rest)
        } else if text.starts_with(|c: char| c.is_ascii_digit() || c == 'v') {
            (Op::Exact, text)
        } else {
            let operator: String = text
                .chars()
                .take_while(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
                .collect();
            return Err(fail(format!("unsupported operator '{operator}'")));
        };

        let version = parse_version(rest).map_err(|e| fail(e.to_string()))?;
        Ok(Self {
            op,
            version: Some(version),
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(version) = &self.version else {
            return f.write_str("==latest");
        };
        let op = match self.op {
            Op::Exact | Op::Latest => "",
            Op::Caret => "^",
            Op::Tilde => "~",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
        };
        write!(f, "{op}{version}")
    }
}
