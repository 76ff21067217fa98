//! Metadata resolution with the persistent cache in front of the feeds.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::application::errors::{attempted_sources, AcquireError};
use crate::config::NuGetEnv;
use crate::domain::{
    Credentials, Dependency, DownloadLink, PackageMetadata, PackageName, PackageSource, SemVer,
};
use crate::infrastructure::disk_cache::MetadataCache;
use crate::infrastructure::feeds::{local, v2_odata, FeedRequest};

/// What the resolution collaborators consume.
#[derive(Debug, Clone)]
pub struct PackageDetails {
    /// The feed's authoritative casing.
    pub name: PackageName,
    /// The source that answered.
    pub source: PackageSource,
    pub download: DownloadLink,
    pub unlisted: bool,
    pub license_url: String,
    pub direct_dependencies: Vec<Dependency>,
}

impl PackageDetails {
    fn from_metadata(source: PackageSource, metadata: PackageMetadata) -> Self {
        Self {
            name: PackageName::new(metadata.package_name),
            source,
            download: metadata.download,
            unlisted: metadata.unlisted,
            license_url: metadata.license_url,
            direct_dependencies: metadata.dependencies,
        }
    }
}

/// Resolve metadata from one remote feed, going through the disk cache.
///
/// A `.failed` marker from an earlier attempt short-circuits everything
/// until `force`; a cache hit with the current schema answers without any
/// network traffic; anything fetched fresh is written back best-effort.
pub async fn get_details_from_nuget(
    env: &Arc<NuGetEnv>,
    force: bool,
    auth: Option<Credentials>,
    url: &str,
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageMetadata, AcquireError> {
    let cache = MetadataCache::new(env.cache_root());
    let cache_file = cache.cache_file(name, version, url);
    let error_file = MetadataCache::error_file(&cache_file);

    if !force && error_file.exists() {
        return Err(AcquireError::StickyFailure {
            name: name.as_str().to_string(),
            version: version.to_string(),
            marker: error_file,
        });
    }

    let cached = if force { None } else { cache.load(&cache_file).await };
    let (was_cached, metadata) = match cached {
        Some(metadata) => {
            debug!(package = %name, %version, "metadata cache hit");
            (true, metadata)
        }
        None => {
            let request = FeedRequest::new(env.clone(), auth, url, name.clone());
            match v2_odata::fetch_metadata(&request, version).await {
                Ok(metadata) => (false, metadata),
                Err(e) => {
                    cache.mark_failed(&error_file, &e.to_string()).await;
                    return Err(e.into());
                }
            }
        }
    };

    cache.clear_failed(&error_file).await;
    if !was_cached {
        cache.store(&cache_file, &metadata).await;
    }
    Ok(metadata)
}

/// Resolve details across all sources in parallel; the first source to
/// produce metadata wins and the rest are aborted.
pub async fn get_package_details(
    env: &Arc<NuGetEnv>,
    force: bool,
    sources: &[PackageSource],
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageDetails, AcquireError> {
    let mut attempts = JoinSet::new();

    for source in sources.iter().cloned() {
        let env = env.clone();
        let name = name.clone();
        let version = version.clone();
        attempts.spawn(async move {
            let result = match &source {
                PackageSource::Remote { url, auth } => {
                    get_details_from_nuget(&env, force, auth.clone(), url, &name, &version).await
                }
                PackageSource::Local { path } => local::fetch_metadata(path, &name, &version).await,
            };
            match result {
                Ok(metadata) => Some(PackageDetails::from_metadata(source, metadata)),
                Err(e) => {
                    debug!(source = %source, error = %e, "source could not provide details");
                    None
                }
            }
        });
    }

    while let Some(joined) = attempts.join_next().await {
        if let Ok(Some(details)) = joined {
            attempts.abort_all();
            return Ok(details);
        }
    }

    // Nothing answered: drop stale failure markers so the next attempt
    // starts clean, then report every source we tried.
    let cache = MetadataCache::new(env.cache_root());
    for source in sources {
        if let PackageSource::Remote { url, .. } = source {
            let error_file = MetadataCache::error_file(&cache.cache_file(name, version, url));
            cache.clear_failed(&error_file).await;
        }
    }
    warn!(package = %name, %version, "no source could provide package details");
    Err(AcquireError::DetailsUnavailable {
        name: name.as_str().to_string(),
        version: version.to_string(),
        attempted: attempted_sources(sources),
    })
}
