//! The fast V2 JSON version listing some feeds serve next to OData.

use async_trait::async_trait;
use tracing::debug;

use crate::application::errors::FeedError;

use super::{fetch_text, FeedRequest, V2Variant, VersionLister, VersionListing};

/// `GET {feed}/package-versions/{name}?includePrerelease=true`
pub struct JsonVersionsLister;

#[async_trait]
impl VersionLister for JsonVersionsLister {
    fn variant(&self) -> V2Variant {
        V2Variant::JsonVersions
    }

    async fn list(&self, request: &FeedRequest) -> Result<VersionListing, FeedError> {
        let url = format!(
            "{}/package-versions/{}?includePrerelease=true",
            request.base(),
            urlencoding::encode(request.package.as_str())
        );

        let body = match fetch_text(&request.env, request.auth.as_ref(), &url, None).await {
            Ok(body) => body,
            Err(FeedError::Network { .. } | FeedError::Status { .. }) => {
                debug!(%url, "feed has no package-versions endpoint");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<Vec<String>>(&body) {
            Ok(versions) => Ok(Some(versions)),
            Err(e) => {
                debug!(%url, error = %e, "package-versions payload is not a JSON string array");
                Ok(None)
            }
        }
    }
}
