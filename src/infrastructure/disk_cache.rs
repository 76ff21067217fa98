//! The persistent metadata cache.
//!
//! One JSON file per `(package, version, feed)` triple, keyed by the
//! normalized feed URL's hash so that spelling variants of a feed share
//! entries. A sibling `.failed` file memoizes failures: its presence makes
//! later attempts fail fast until the caller forces a retry. The cache is a
//! best-effort accelerator, so writes never fail the operation that produced
//! the data.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::domain::{normalize_feed_url, PackageMetadata, PackageName, SemVer};

/// Paths into the metadata cache for one feed's view of one package version.
pub struct MetadataCache {
    root: PathBuf,
}

impl MetadataCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/{name}.{normalized}.s{urlhash}.json`
    pub fn cache_file(&self, name: &PackageName, version: &SemVer, feed_url: &str) -> PathBuf {
        self.root.join(format!(
            "{}.{}.s{}.json",
            name.as_str(),
            version.normalize(),
            url_hash(feed_url)
        ))
    }

    /// The sticky-failure marker next to a cache file.
    pub fn error_file(cache_file: &Path) -> PathBuf {
        let mut name = cache_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".failed");
        cache_file.with_file_name(name)
    }

    /// Cached archive location for a package version.
    pub fn archive_file(&self, name: &PackageName, version: &SemVer) -> PathBuf {
        self.root
            .join(format!("{}.{}.nupkg", name.as_str(), version.normalize()))
    }

    /// Cached license location for a package version.
    pub fn license_file(&self, name: &PackageName, version: &SemVer) -> PathBuf {
        self.root.join(format!(
            "{}.{}.license.html",
            name.as_str(),
            version.normalize()
        ))
    }

    /// Load a cached entry. Any read or decode failure, and any entry from
    /// an older schema, reads as a miss.
    pub async fn load(&self, cache_file: &Path) -> Option<PackageMetadata> {
        let bytes = tokio::fs::read(cache_file).await.ok()?;
        match serde_json::from_slice::<PackageMetadata>(&bytes) {
            Ok(metadata) if metadata.has_current_schema() => Some(metadata),
            Ok(metadata) => {
                debug!(
                    file = %cache_file.display(),
                    schema = %metadata.cache_version,
                    "cached entry has an outdated schema, refetching"
                );
                None
            }
            Err(e) => {
                debug!(file = %cache_file.display(), error = %e, "cached entry unreadable, refetching");
                None
            }
        }
    }

    /// Persist an entry. Failures are logged and swallowed.
    pub async fn store(&self, cache_file: &Path, metadata: &PackageMetadata) {
        let payload = match serde_json::to_vec_pretty(metadata) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(file = %cache_file.display(), error = %e, "could not serialize metadata for caching");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(cache_file, payload).await {
            warn!(file = %cache_file.display(), error = %e, "could not write metadata cache");
        }
    }

    /// Append a failure diagnostic to the marker file.
    pub async fn mark_failed(&self, error_file: &Path, diagnostic: &str) {
        let write = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(error_file)
                .await?;
            file.write_all(diagnostic.as_bytes()).await?;
            file.write_all(b"\n").await?;
            Ok::<_, std::io::Error>(())
        };
        if let Err(e) = write.await {
            warn!(file = %error_file.display(), error = %e, "could not record failure marker");
        }
    }

    /// Remove the marker file if present.
    pub async fn clear_failed(&self, error_file: &Path) {
        match tokio::fs::remove_file(error_file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(file = %error_file.display(), error = %e, "could not remove failure marker")
            }
        }
    }
}

/// Stable 64-bit hash of the normalized feed URL: the first eight bytes of
/// its SHA-256, little-endian. Stays put across runs and platforms so cache
/// files keep their names.
pub fn url_hash(feed_url: &str) -> u64 {
    let digest = Sha256::digest(normalize_feed_url(feed_url).as_bytes());
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(first)
}
