//! Version constraint parsing and matching.
//!
//! Constraints are comma-separated clauses, each an optional operator followed
//! by a version:
//!
//! | Operator | Meaning                                          |
//! |----------|--------------------------------------------------|
//! | (none)   | exactly this version (same as `=`)               |
//! | `=`      | exactly this version                             |
//! | `!=`     | anything except this version                     |
//! | `>` `>=` | newer than / at least                            |
//! | `<` `<=` | older than / at most                             |
//! | `~>`     | rightmost given component may increment          |
//!
//! A prerelease version only satisfies a constraint that names it exactly
//! with `=`.

use std::fmt;
use std::str::FromStr;

use semver::Version;

use super::ReferenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Pessimistic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    op: Operator,
    version: Version,
    /// How many numeric components the user wrote (1..=3); drives `~>`.
    precision: usize,
}

impl Clause {
    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            Operator::Eq => candidate == &self.version,
            Operator::Ne => candidate != &self.version,
            Operator::Gt => candidate > &self.version,
            Operator::Ge => candidate >= &self.version,
            Operator::Lt => candidate < &self.version,
            Operator::Le => candidate <= &self.version,
            Operator::Pessimistic => {
                if candidate < &self.version {
                    return false;
                }
                let upper = match self.precision {
                    1 | 2 => Version::new(self.version.major + 1, 0, 0),
                    _ => Version::new(self.version.major, self.version.minor + 1, 0),
                };
                candidate < &upper
            }
        }
    }

    fn names_exactly(&self, candidate: &Version) -> bool {
        self.op == Operator::Eq && &self.version == candidate
    }
}

/// A version requirement attached to a provider.
///
/// The original text is preserved for display; the core never rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    clauses: Vec<Clause>,
}

impl VersionConstraint {
    /// A constraint accepting any non-prerelease version.
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            clauses: Vec::new(),
        }
    }

    /// The constraint text as supplied by the caller.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this constraint has no clauses.
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check whether a concrete version satisfies every clause.
    pub fn matches(&self, candidate: &Version) -> bool {
        if !candidate.pre.is_empty() && !self.clauses.iter().any(|c| c.names_exactly(candidate)) {
            return false;
        }
        self.clauses.iter().all(|c| c.matches(candidate))
    }

    /// Choose the newest version from `candidates` that satisfies this constraint.
    pub fn select_newest<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }

    /// Combine two constraints; the result accepts only versions both accept.
    pub fn intersect(&self, other: &VersionConstraint) -> VersionConstraint {
        let raw = match (self.raw.is_empty(), other.raw.is_empty()) {
            (true, _) => other.raw.clone(),
            (_, true) => self.raw.clone(),
            _ => format!("{}, {}", self.raw, other.raw),
        };
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        Self { raw, clauses }
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionConstraint {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_string();
        if raw.is_empty() {
            return Ok(Self::any());
        }
        let clauses = raw
            .split(',')
            .map(|part| parse_clause(&raw, part))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { raw, clauses })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "(any version)")
        } else {
            write!(f, "{}", self.raw)
        }
    }
}

fn parse_clause(input: &str, part: &str) -> Result<Clause, ReferenceError> {
    let part = part.trim();
    let invalid = |reason: String| ReferenceError::InvalidConstraint {
        input: input.to_string(),
        reason,
    };

    // Two-character operators must be checked before their prefixes.
    let (op, rest) = [
        ("~>", Operator::Pessimistic),
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        ("!=", Operator::Ne),
        ("=", Operator::Eq),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ]
    .iter()
    .find_map(|(sym, op)| part.strip_prefix(sym).map(|rest| (*op, rest)))
    .unwrap_or((Operator::Eq, part));

    let text = rest.trim();
    let text = text.strip_prefix('v').unwrap_or(text);
    if text.is_empty() {
        return Err(invalid("missing version".to_string()));
    }

    let (version, precision) = parse_partial_version(text).map_err(invalid)?;
    if op == Operator::Pessimistic && !version.pre.is_empty() {
        return Err(invalid("~> does not accept prerelease versions".to_string()));
    }

    Ok(Clause {
        op,
        version,
        precision,
    })
}

/// Parse `1`, `1.2`, `1.2.3` or `1.2.3-pre+build`, padding missing components.
fn parse_partial_version(text: &str) -> Result<(Version, usize), String> {
    let core_end = text.find(|c: char| c == '-' || c == '+').unwrap_or(text.len());
    let (core, suffix) = text.split_at(core_end);

    let components: Vec<&str> = core.split('.').collect();
    if components.is_empty() || components.len() > 3 {
        return Err(format!("{:?} is not a version", text));
    }
    if components
        .iter()
        .any(|c| c.is_empty() || !c.chars().all(|ch| ch.is_ascii_digit()))
    {
        return Err(format!("{:?} is not a version", text));
    }
    if !suffix.is_empty() && components.len() != 3 {
        return Err(format!(
            "{:?}: prerelease versions must be written in full",
            text
        ));
    }

    let mut padded = components.clone();
    padded.resize(3, "0");
    let normalized = format!("{}{}", padded.join("."), suffix);
    let version = Version::parse(&normalized).map_err(|e| format!("{:?}: {}", text, e))?;
    Ok((version, components.len()))
}
