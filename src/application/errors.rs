//! Error types for the acquisition pipeline.
//!
//! `FeedError` covers a single conversation with a single feed; variants map
//! onto the outcomes the racing layers care about (network trouble, a
//! response that would not parse, a plain miss). `AcquireError` is what the
//! public operations surface once every peer has had its chance.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one request against one feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The request never produced a usable response.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The feed answered with a non-success status.
    #[error("{url} answered {status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    /// The feed answered 2xx but the payload could not be decoded.
    #[error("unparseable response from {url}: {message}")]
    Protocol { url: String, message: String },

    /// The package or version is absent from this feed.
    #[error("{name} {version} was not found on {url}")]
    NotFound {
        url: String,
        name: String,
        version: String,
    },
}

impl FeedError {
    pub fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Failure of a public acquisition operation.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A previous fetch of the same identity failed and left a marker; the
    /// caller must pass `force` to retry.
    #[error(
        "an earlier attempt to fetch {name} {version} failed; \
         details in {} (use force to retry)",
        marker.display()
    )]
    StickyFailure {
        name: String,
        version: String,
        marker: PathBuf,
    },

    /// No source had any version of the package.
    #[error("no version of {name} was found on any source:\n{attempted}")]
    NoVersions { name: String, attempted: String },

    /// Every source failed to provide metadata for the identity.
    #[error("could not get package details for {name} {version} from:\n{attempted}")]
    DetailsUnavailable {
        name: String,
        version: String,
        attempted: String,
    },

    /// A local source directory that must exist does not.
    #[error("package directory {} does not exist", path.display())]
    MissingLocalSource { path: PathBuf },

    /// No archive for the requested identity in a local source.
    #[error("no matching archive for {name} {version} under {}", path.display())]
    LocalArchiveNotFound {
        name: String,
        version: String,
        path: PathBuf,
    },

    /// The metadata points at a local archive, so there is nothing to
    /// download.
    #[error(
        "{name} {version} resolves to the local archive {}; downloading does not apply",
        path.display()
    )]
    NothingToDownload {
        name: String,
        version: String,
        path: PathBuf,
    },

    /// The archive is corrupt, truncated, or not an archive at all. The
    /// snippet shows how the file starts, which exposes feeds that serve an
    /// HTML error page with a 200.
    #[error(
        "could not extract {}: {message}\nthe file begins with:\n{snippet}",
        archive.display()
    )]
    Extraction {
        archive: PathBuf,
        message: String,
        snippet: String,
    },
}

/// Render a list of attempted sources for a multi-source diagnostic.
pub fn attempted_sources(sources: &[crate::domain::PackageSource]) -> String {
    sources
        .iter()
        .map(|s| format!("  - {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}
