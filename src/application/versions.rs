//! Version enumeration across sources.
//!
//! Every source is queried in parallel. Within one remote source the V2
//! variants (guarded by the protocol memo) and the V3 search race each
//! other; the first attempt to come back with a non-`None` listing wins and
//! the rest are aborted. Local sources are a single directory scan. The
//! union of all per-source winners, parsed and de-duplicated, is the result.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::application::errors::{attempted_sources, AcquireError};
use crate::config::NuGetEnv;
use crate::domain::{Credentials, PackageName, PackageSource, SemVer};
use crate::infrastructure::feeds::selector::guarded_list;
use crate::infrastructure::feeds::{local, v2_listers, v3, FeedRequest};

/// All versions of `name` available across `sources`.
pub async fn get_versions(
    env: &Arc<NuGetEnv>,
    sources: &[PackageSource],
    name: &PackageName,
) -> Result<Vec<SemVer>, AcquireError> {
    let mut per_source = JoinSet::new();

    for source in sources.iter().cloned() {
        let env = env.clone();
        let name = name.clone();
        per_source.spawn(async move {
            match source {
                PackageSource::Remote { url, auth } => {
                    Ok(versions_from_remote(env, auth, url, name).await)
                }
                // A configured local source that cannot be read is a broken
                // setup, not an empty feed.
                PackageSource::Local { path } => {
                    local::list_versions(&path, &name).await.map(Some)
                }
            }
        });
    }

    let mut seen = HashSet::new();
    let mut versions = Vec::new();
    while let Some(joined) = per_source.join_next().await {
        let listed = match joined {
            Ok(Ok(Some(listed))) => listed,
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "source listing task failed");
                continue;
            }
        };
        for raw in listed {
            match SemVer::parse(&raw) {
                Ok(version) => {
                    if seen.insert(version.clone()) {
                        versions.push(version);
                    }
                }
                Err(e) => debug!(version = %raw, error = %e, "skipping unparseable version"),
            }
        }
    }

    if versions.is_empty() {
        return Err(AcquireError::NoVersions {
            name: name.as_str().to_string(),
            attempted: attempted_sources(sources),
        });
    }
    Ok(versions)
}

/// Race all protocol variants against one remote feed; first non-`None`
/// listing wins, remaining attempts are aborted.
async fn versions_from_remote(
    env: Arc<NuGetEnv>,
    auth: Option<Credentials>,
    url: String,
    name: PackageName,
) -> Option<Vec<String>> {
    let request = FeedRequest::new(env, auth, url.clone(), name);

    let mut attempts = JoinSet::new();
    for lister in v2_listers() {
        let request = request.clone();
        attempts.spawn(async move { guarded_list(lister.as_ref(), &request).await });
    }
    {
        let request = request.clone();
        attempts.spawn(async move { v3::list_versions(&request).await });
    }

    while let Some(joined) = attempts.join_next().await {
        match joined {
            Ok(Ok(Some(versions))) => {
                attempts.abort_all();
                return Some(versions);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => debug!(%url, error = %e, "feed variant failed"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(%url, error = %e, "feed variant task failed"),
        }
    }
    None
}
