//! Semantic versions as they appear on NuGet feeds.
//!
//! Feed version strings are four-segment at most (`major.minor.patch.revision`)
//! with optional pre-release and build metadata. The canonical form produced by
//! [`SemVer::normalize`] is what cache keys and feed queries use; [`Display`]
//! keeps the permissive original text so raw-string matching against feeds that
//! never normalized their data still works.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced when a version string cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': {message}")]
pub struct VersionParseError {
    pub input: String,
    pub message: String,
}

impl VersionParseError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

/// A parsed package version.
///
/// Equality, ordering and hashing follow SemVer precedence over the structured
/// fields: build metadata and the original spelling never participate, so
/// `1.0` and `1.0.0.0+sha1` are the same version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Fourth segment used by legacy .NET assembly versions; zero when absent.
    pub revision: u64,
    /// Dot-separated pre-release identifiers, empty for release versions.
    pub prerelease: Vec<String>,
    /// Build metadata after `+`, ignored for precedence.
    pub build: String,
    original: String,
}

impl SemVer {
    /// Parse a version string, accepting one to four numeric segments.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::new(input, "empty version string"));
        }

        let (precedence, build) = match trimmed.split_once('+') {
            Some((v, b)) => (v, b.to_string()),
            None => (trimmed, String::new()),
        };
        let (numeric, prerelease_raw) = match precedence.split_once('-') {
            Some((v, p)) => (v, Some(p)),
            None => (precedence, None),
        };

        let mut segments = [0u64; 4];
        let mut count = 0;
        for part in numeric.split('.') {
            if count == 4 {
                return Err(VersionParseError::new(input, "more than four segments"));
            }
            segments[count] = part
                .parse::<u64>()
                .map_err(|_| VersionParseError::new(input, format!("segment '{part}' is not numeric")))?;
            count += 1;
        }
        if count == 0 {
            return Err(VersionParseError::new(input, "no numeric segments"));
        }

        let prerelease = match prerelease_raw {
            Some(raw) if !raw.is_empty() => raw.split('.').map(str::to_string).collect(),
            Some(_) => return Err(VersionParseError::new(input, "empty pre-release label")),
            None => Vec::new(),
        };

        Ok(Self {
            major: segments[0],
            minor: segments[1],
            patch: segments[2],
            revision: segments[3],
            prerelease,
            build,
            original: trimmed.to_string(),
        })
    }

    /// Canonical string: three segments, revision only when non-zero,
    /// pre-release kept, build metadata dropped. Cache keys and feed queries
    /// are built from this form.
    pub fn normalize(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision != 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        if !self.prerelease.is_empty() {
            out.push('-');
            out.push_str(&self.prerelease.join("."));
        }
        out
    }

    /// The string the version was parsed from.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    fn numeric_key(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }
}

impl FromStr for SemVer {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemVer {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemVer> for String {
    fn from(v: SemVer) -> String {
        v.original
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.numeric_key() == other.numeric_key() && self.prerelease == other.prerelease
    }
}

impl Eq for SemVer {}

impl Hash for SemVer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numeric_key().hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric_key()
            .cmp(&other.numeric_key())
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

/// SemVer precedence for pre-release identifiers: a release outranks any
/// pre-release, numeric identifiers compare numerically and rank below
/// alphanumeric ones, shorter identifier lists rank below longer prefixes.
fn compare_prerelease(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(nx), Ok(ny)) => nx.cmp(&ny),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}
