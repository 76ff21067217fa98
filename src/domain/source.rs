//! Package sources and feed credentials.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Credentials attached to a remote feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    /// An API token, sent as a bearer header on feed queries.
    Token(String),
    /// Username and password, sent preemptively as basic auth.
    Basic { username: String, password: String },
}

impl Credentials {
    /// A stable key identifying these credentials without exposing secrets,
    /// used alongside the feed URL to index per-endpoint state.
    pub fn memo_key(auth: Option<&Credentials>) -> String {
        match auth {
            None => String::new(),
            Some(Credentials::Token(token)) => format!("token:{token}"),
            Some(Credentials::Basic { username, .. }) => format!("basic:{username}"),
        }
    }
}

/// A place packages come from: a remote NuGet feed or a local directory of
/// `.nupkg` archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSource {
    Remote {
        url: String,
        auth: Option<Credentials>,
    },
    Local {
        path: PathBuf,
    },
}

impl PackageSource {
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote {
            url: url.into(),
            auth: None,
        }
    }

    pub fn remote_with_auth(url: impl Into<String>, auth: Credentials) -> Self {
        Self::Remote {
            url: url.into(),
            auth: Some(auth),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { url, .. } => f.write_str(url),
            Self::Local { path } => f.write_str(&path.display().to_string()),
        }
    }
}

/// Normalize a feed URL for cache-key purposes so that spelling variants of
/// the same feed share cached results: the scheme collapses to `http`, the
/// host is lowercased, and a leading `www.` is dropped. Path and query are
/// left untouched.
pub fn normalize_feed_url(url: &str) -> String {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let split_at = rest.find(['/', '?']).unwrap_or(rest.len());
    let (host, tail) = rest.split_at(split_at);
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    format!("http://{host}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_and_www_collapse() {
        assert_eq!(normalize_feed_url("https://www.x/"), "http://x/");
        assert_eq!(normalize_feed_url("http://x/"), "http://x/");
    }

    #[test]
    fn host_is_lowercased_but_path_kept() {
        assert_eq!(
            normalize_feed_url("https://NuGet.Org/Api/V2"),
            "http://nuget.org/Api/V2"
        );
    }

    #[test]
    fn missing_scheme_is_tolerated() {
        assert_eq!(normalize_feed_url("feed.example.com/v2"), "http://feed.example.com/v2");
    }

    #[test]
    fn memo_key_distinguishes_auth_kinds() {
        let token = Credentials::Token("abc".into());
        let basic = Credentials::Basic {
            username: "u".into(),
            password: "p".into(),
        };
        assert_eq!(Credentials::memo_key(None), "");
        assert_ne!(Credentials::memo_key(Some(&token)), Credentials::memo_key(Some(&basic)));
    }
}
