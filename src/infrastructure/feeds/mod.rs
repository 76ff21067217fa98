//! Feed protocol adapters.
//!
//! A feed URL may speak any of four mutually incompatible protocols. Each
//! adapter exposes a version-listing capability through [`VersionLister`];
//! the OData adapter additionally fetches single-version metadata. Listing
//! outcomes distinguish "this protocol is not served here" (`None`) from
//! "served, but no results" (`Some(vec![])`).

pub mod local;
pub mod selector;
pub mod v2_json;
pub mod v2_odata;
pub mod v3;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;

use crate::application::errors::FeedError;
use crate::config::NuGetEnv;
use crate::domain::{Credentials, PackageName};

/// `None` = protocol not served here; `Some(vec![])` = served, no results.
pub type VersionListing = Option<Vec<String>>;

/// The V2 protocol variants that compete for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum V2Variant {
    /// `Packages?$filter=Id eq '…'`
    ODataFilter,
    /// `FindPackagesById()?id='…'`
    FindById,
    /// `package-versions/{name}` JSON endpoint
    JsonVersions,
}

/// Everything an adapter needs to talk to one feed about one package.
#[derive(Clone)]
pub struct FeedRequest {
    pub env: Arc<NuGetEnv>,
    pub auth: Option<Credentials>,
    pub url: String,
    pub package: PackageName,
}

impl FeedRequest {
    pub fn new(
        env: Arc<NuGetEnv>,
        auth: Option<Credentials>,
        url: impl Into<String>,
        package: PackageName,
    ) -> Self {
        Self {
            env,
            auth,
            url: url.into(),
            package,
        }
    }

    /// The feed URL without a trailing slash, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// A version-listing capability of one V2 protocol variant.
#[async_trait]
pub trait VersionLister: Send + Sync {
    fn variant(&self) -> V2Variant;

    async fn list(&self, request: &FeedRequest) -> Result<VersionListing, FeedError>;
}

/// All V2 listers, in the order they race.
pub fn v2_listers() -> Vec<Arc<dyn VersionLister>> {
    vec![
        Arc::new(v2_odata::ODataFilterLister),
        Arc::new(v2_odata::FindByIdLister),
        Arc::new(v2_json::JsonVersionsLister),
    ]
}

/// Attach feed credentials to a request: tokens ride as bearer headers,
/// basic credentials go out preemptively rather than waiting for a 401.
pub(crate) fn apply_auth(request: RequestBuilder, auth: Option<&Credentials>) -> RequestBuilder {
    match auth {
        None => request,
        Some(Credentials::Token(token)) => request.bearer_auth(token),
        Some(Credentials::Basic { username, password }) => {
            request.basic_auth(username, Some(password))
        }
    }
}

/// GET a URL and return the body on 2xx; non-success statuses and transport
/// failures become the matching [`FeedError`] variants.
pub(crate) async fn fetch_text(
    env: &NuGetEnv,
    auth: Option<&Credentials>,
    url: &str,
    accept: Option<&str>,
) -> Result<String, FeedError> {
    let client = env.http(url)?;
    let mut request = client.get(url);
    if let Some(accept) = accept {
        request = request.header(reqwest::header::ACCEPT, accept);
    }
    let response = apply_auth(request, auth)
        .send()
        .await
        .map_err(|source| FeedError::Network {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown").to_string(),
        });
    }

    response.text().await.map_err(|source| FeedError::Network {
        url: url.to_string(),
        source,
    })
}
