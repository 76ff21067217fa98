//! Target-framework restrictions on dependencies.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Restricts a dependency edge to particular target frameworks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameworkRestriction {
    /// Applies only when building for exactly this framework moniker.
    Exactly(String),
    /// Applies to a portable profile, kept as the raw profile string
    /// (e.g. `portable-net45+win8`).
    Portable(String),
}

impl fmt::Display for FrameworkRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(fw) => f.write_str(fw),
            Self::Portable(profile) => f.write_str(profile),
        }
    }
}

static FRAMEWORK_MONIKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^(
            net[1-9][0-9]{0,2}            # net20 .. net481
          | net[1-9][0-9]*\.[0-9.]+       # net5.0 and later dotted forms
          | netstandard[0-9]+(\.[0-9]+)*
          | netcoreapp[0-9]+(\.[0-9]+)*
          | netmf
          | sl[0-9]+
          | wp[0-9]+
          | wpa[0-9]+
          | uap[0-9]+(\.[0-9]+)*
          | monoandroid[0-9.]*
          | monotouch[0-9.]*
          | monomac
          | xamarinios
          | xamarinmac
          | xamarintvos
          | xamarinwatchos
          | native
          | dnx[0-9.]*
          | dnxcore[0-9.]*
        )$",
    )
    .expect("framework moniker pattern")
});

/// Recognize a target-framework moniker, returning its lowercase form.
///
/// Feeds carry a mix of monikers and noise in the dependency grammar; anything
/// unrecognized is treated as "no restriction" by the caller.
pub fn extract_framework(spec: &str) -> Option<String> {
    let candidate = spec.trim().to_lowercase();
    FRAMEWORK_MONIKER.is_match(&candidate).then_some(candidate)
}
