//! The V2 OData adapter: Atom version listings in both query shapes and the
//! single-version metadata fetch with its fast and canonical URL forms.

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::debug;

use crate::application::errors::FeedError;
use crate::domain::{PackageMetadata, PackageName, SemVer};
use crate::infrastructure::odata;

use super::{fetch_text, FeedRequest, V2Variant, VersionLister, VersionListing};

const ATOM: &str = "application/atom+xml";

/// `GET {feed}/Packages?$filter=Id eq '{name}'`
pub struct ODataFilterLister;

#[async_trait]
impl VersionLister for ODataFilterLister {
    fn variant(&self) -> V2Variant {
        V2Variant::ODataFilter
    }

    async fn list(&self, request: &FeedRequest) -> Result<VersionListing, FeedError> {
        let start = format!(
            "{}/Packages?$filter=Id%20eq%20'{}'",
            request.base(),
            urlencoding::encode(request.package.as_str())
        );
        list_paginated(request, start).await
    }
}

/// `GET {feed}/FindPackagesById()?id='{name}'`
pub struct FindByIdLister;

#[async_trait]
impl VersionLister for FindByIdLister {
    fn variant(&self) -> V2Variant {
        V2Variant::FindById
    }

    async fn list(&self, request: &FeedRequest) -> Result<VersionListing, FeedError> {
        let start = format!(
            "{}/FindPackagesById()?id='{}'",
            request.base(),
            urlencoding::encode(request.package.as_str())
        );
        list_paginated(request, start).await
    }
}

/// Fetch the first page, then follow every `link rel="next"` in parallel
/// waves until the chain runs dry, concatenating the versions of all pages.
/// A non-success status or unparseable first page means the protocol is not
/// served at this endpoint.
async fn list_paginated(request: &FeedRequest, start: String) -> Result<VersionListing, FeedError> {
    let first = match fetch_text(&request.env, request.auth.as_ref(), &start, Some(ATOM)).await {
        Ok(body) => body,
        Err(FeedError::Network { .. } | FeedError::Status { .. }) => {
            debug!(url = %start, "feed does not answer this OData shape");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let page = match odata::parse_version_page(&first, &start) {
        Ok(page) => page,
        Err(_) => {
            debug!(url = %start, "response is not an OData feed");
            return Ok(None);
        }
    };

    let mut versions = page.versions;
    let mut frontier = page.next_links;

    while !frontier.is_empty() {
        let mut tasks = JoinSet::new();
        for url in frontier.drain(..) {
            let env = request.env.clone();
            let auth = request.auth.clone();
            tasks.spawn(async move {
                let body = fetch_text(&env, auth.as_ref(), &url, Some(ATOM)).await?;
                odata::parse_version_page(&body, &url)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let page = joined.map_err(|e| {
                FeedError::protocol(&request.url, format!("pagination task failed: {e}"))
            })??;
            versions.extend(page.versions);
            frontier.extend(page.next_links);
        }
    }

    Ok(Some(versions))
}

/// Fetch metadata for one version, trying the fast `$filter` forms first and
/// the canonical entity addresses after that.
pub async fn fetch_metadata(
    request: &FeedRequest,
    version: &SemVer,
) -> Result<PackageMetadata, FeedError> {
    let name = urlencoding::encode(request.package.as_str()).into_owned();
    let raw = urlencoding::encode(version.original()).into_owned();
    let normalized = urlencoding::encode(&version.normalize()).into_owned();
    let base = request.base();

    let candidates = [
        format!("{base}/Packages?$filter=Id%20eq%20'{name}'%20and%20NormalizedVersion%20eq%20'{normalized}'"),
        format!("{base}/Packages?$filter=Id%20eq%20'{name}'%20and%20Version%20eq%20'{raw}'"),
        format!("{base}/Packages(Id='{name}',Version='{raw}')"),
        format!("{base}/odata/Packages(Id='{name}',Version='{raw}')"),
    ];

    let mut last_error = None;
    for url in candidates {
        match try_entry(request, version, &url).await {
            Ok(metadata) => return Ok(metadata),
            Err(e) => {
                debug!(%url, error = %e, "metadata candidate failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| FeedError::NotFound {
        url: request.url.clone(),
        name: request.package.as_str().to_string(),
        version: version.to_string(),
    }))
}

async fn try_entry(
    request: &FeedRequest,
    version: &SemVer,
    url: &str,
) -> Result<PackageMetadata, FeedError> {
    let body = fetch_text(&request.env, request.auth.as_ref(), url, Some(ATOM)).await?;
    odata::parse_entry(&body, &request.url, &request.package, version)
}
