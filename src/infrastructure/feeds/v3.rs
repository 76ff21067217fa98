//! The V3 JSON search adapter.
//!
//! V3 search endpoints are not discoverable from a V2 feed URL, so a fixed
//! advertisement table maps the well-known nuget.org spellings onto their
//! search service. Feeds outside the table simply never race a V3 attempt.

use serde::Deserialize;
use tracing::debug;

use crate::application::errors::FeedError;
use crate::domain::normalize_feed_url;

use super::{fetch_text, FeedRequest, VersionListing};

/// Feed URLs (normalized) that advertise a V3 search service.
const SEARCH_ENDPOINTS: [(&str, &str); 4] = [
    ("http://nuget.org/api/v2", "https://azuresearch-usnc.nuget.org/query"),
    ("http://api.nuget.org/v3/index.json", "https://azuresearch-usnc.nuget.org/query"),
    ("http://preview.nuget.org/ver3-ctp1/index.json", "https://azuresearch-usnc.nuget.org/query"),
    ("http://myget.org", "https://azuresearch-usnc.nuget.org/query"),
];

/// Hard ceiling on how many search results pagination will walk.
const MAX_RESULTS: usize = 100_000;
const PAGE_SIZE: usize = 1_000;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    #[serde(default)]
    versions: Vec<SearchVersion>,
}

#[derive(Debug, Deserialize)]
struct SearchVersion {
    version: String,
}

/// The search service advertised for a feed URL, if any.
pub fn search_endpoint(feed_url: &str) -> Option<&'static str> {
    let normalized = normalize_feed_url(feed_url);
    let normalized = normalized.trim_end_matches('/');
    SEARCH_ENDPOINTS
        .iter()
        .find(|(feed, _)| normalized == feed.trim_end_matches('/'))
        .map(|(_, endpoint)| *endpoint)
}

/// List versions through V3 search. `None` when the feed advertises no
/// search service, when the network fails, or when the search comes back
/// empty; the V2 variants then carry the endpoint.
pub async fn list_versions(request: &FeedRequest) -> Result<VersionListing, FeedError> {
    let Some(endpoint) = search_endpoint(&request.url) else {
        return Ok(None);
    };

    let mut versions = Vec::new();
    let mut skip = 0;

    while skip < MAX_RESULTS {
        let url = format!(
            "{endpoint}?q=packageid:{}&prerelease=true&semVerLevel=2.0.0&skip={skip}&take={PAGE_SIZE}",
            urlencoding::encode(request.package.as_str())
        );
        let body = match fetch_text(&request.env, request.auth.as_ref(), &url, None).await {
            Ok(body) => body,
            Err(e) => {
                debug!(%url, error = %e, "search request failed");
                return Ok(None);
            }
        };
        let response: SearchResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, error = %e, "search payload did not parse");
                return Ok(None);
            }
        };
        if response.data.is_empty() {
            break;
        }

        let hits = response.data.len();
        for hit in response.data {
            if hit.id.to_lowercase() == request.package.compare_key() {
                versions.extend(hit.versions.into_iter().map(|v| v.version));
            }
        }
        if hits < PAGE_SIZE {
            break;
        }
        skip += PAGE_SIZE;
    }

    if versions.is_empty() {
        return Ok(None);
    }
    Ok(Some(versions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nuget_org_spellings_advertise_search() {
        for url in [
            "https://nuget.org/api/v2",
            "https://www.nuget.org/api/v2/",
            "http://api.nuget.org/v3/index.json",
        ] {
            assert!(search_endpoint(url).is_some(), "{url}");
        }
    }

    #[test]
    fn unknown_feeds_do_not() {
        assert!(search_endpoint("https://feed.example.com/api/v2").is_none());
    }
}
