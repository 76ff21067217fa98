//! Version requirements from the feed dependency grammar.
//!
//! Feeds express dependency constraints in the NuGet interval notation:
//! a bare version pins it, brackets and parentheses form closed/open
//! intervals, a trailing `.*` is a wildcard, and an empty or `"0"` spec
//! means "any version".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::version::SemVer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version requirement '{input}': {message}")]
pub struct RequirementParseError {
    pub input: String,
    pub message: String,
}

impl RequirementParseError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

/// One end of a version interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bound {
    Inclusive(SemVer),
    Exclusive(SemVer),
}

impl Bound {
    fn version(&self) -> &SemVer {
        match self {
            Bound::Inclusive(v) | Bound::Exclusive(v) => v,
        }
    }
}

/// A parsed version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionRequirement {
    /// Any version at all; the parse of an empty or `"0"` spec.
    Unbounded,
    /// Exactly this version (`1.2.3` or `[1.2.3]`).
    Exact(SemVer),
    /// An interval with optional lower and upper bounds (`[1.0,2.0)`).
    Range {
        min: Option<Bound>,
        max: Option<Bound>,
    },
    /// A floating pattern such as `1.0.*`; matches every version sharing the
    /// given leading segments.
    Wildcard { segments: Vec<u64> },
}

impl VersionRequirement {
    pub fn parse(input: &str) -> Result<Self, RequirementParseError> {
        let spec = input.trim();
        if spec.is_empty() || spec == "0" {
            return Ok(Self::Unbounded);
        }

        if let Some(stripped) = spec.strip_suffix(".*").or_else(|| spec.strip_suffix(".x")) {
            let mut segments = Vec::new();
            for part in stripped.split('.') {
                let n = part.parse::<u64>().map_err(|_| {
                    RequirementParseError::new(input, format!("wildcard segment '{part}' is not numeric"))
                })?;
                segments.push(n);
            }
            if segments.is_empty() || segments.len() > 3 {
                return Err(RequirementParseError::new(input, "wildcard needs one to three fixed segments"));
            }
            return Ok(Self::Wildcard { segments });
        }

        let open = spec.starts_with('[') || spec.starts_with('(');
        let close = spec.ends_with(']') || spec.ends_with(')');
        if open != close {
            return Err(RequirementParseError::new(input, "unbalanced interval brackets"));
        }
        if !open {
            // Bare version: the feed grammar treats it as a pin.
            let version = SemVer::parse(spec)
                .map_err(|e| RequirementParseError::new(input, e.message))?;
            return Ok(Self::Exact(version));
        }

        let min_inclusive = spec.starts_with('[');
        let max_inclusive = spec.ends_with(']');
        let inner = &spec[1..spec.len() - 1];

        match inner.split_once(',') {
            None => {
                if !min_inclusive || !max_inclusive {
                    return Err(RequirementParseError::new(input, "single-version interval must use square brackets"));
                }
                let version = SemVer::parse(inner.trim())
                    .map_err(|e| RequirementParseError::new(input, e.message))?;
                Ok(Self::Exact(version))
            }
            Some((lo, hi)) => {
                let lo = lo.trim();
                let hi = hi.trim();
                let min = if lo.is_empty() {
                    None
                } else {
                    let v = SemVer::parse(lo).map_err(|e| RequirementParseError::new(input, e.message))?;
                    Some(if min_inclusive { Bound::Inclusive(v) } else { Bound::Exclusive(v) })
                };
                let max = if hi.is_empty() {
                    None
                } else {
                    let v = SemVer::parse(hi).map_err(|e| RequirementParseError::new(input, e.message))?;
                    Some(if max_inclusive { Bound::Inclusive(v) } else { Bound::Exclusive(v) })
                };
                if min.is_none() && max.is_none() {
                    return Err(RequirementParseError::new(input, "interval with no bounds"));
                }
                Ok(Self::Range { min, max })
            }
        }
    }

    /// Whether `version` satisfies this requirement.
    pub fn matches(&self, version: &SemVer) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Exact(pin) => pin == version,
            Self::Range { min, max } => {
                let lower_ok = match min {
                    None => true,
                    Some(Bound::Inclusive(v)) => version >= v,
                    Some(Bound::Exclusive(v)) => version > v,
                };
                let upper_ok = match max {
                    None => true,
                    Some(Bound::Inclusive(v)) => version <= v,
                    Some(Bound::Exclusive(v)) => version < v,
                };
                lower_ok && upper_ok
            }
            Self::Wildcard { segments } => {
                let actual = [version.major, version.minor, version.patch, version.revision];
                segments.iter().zip(actual.iter()).all(|(want, have)| want == have)
            }
        }
    }
}

impl FromStr for VersionRequirement {
    type Err = RequirementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRequirement {
    type Error = RequirementParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRequirement> for String {
    fn from(value: VersionRequirement) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("0"),
            Self::Exact(v) => f.write_str(v.original()),
            Self::Range { min, max } => {
                let (open, lo) = match min {
                    Some(Bound::Inclusive(v)) => ('[', v.original().to_string()),
                    Some(Bound::Exclusive(v)) => ('(', v.original().to_string()),
                    None => ('(', String::new()),
                };
                let (close, hi) = match max {
                    Some(Bound::Inclusive(v)) => (']', v.original().to_string()),
                    Some(Bound::Exclusive(v)) => (')', v.original().to_string()),
                    None => (')', String::new()),
                };
                write!(f, "{open}{lo},{hi}{close}")
            }
            Self::Wildcard { segments } => {
                let fixed: Vec<String> = segments.iter().map(u64::to_string).collect();
                write!(f, "{}.*", fixed.join("."))
            }
        }
    }
}
