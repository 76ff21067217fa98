//! Per-endpoint protocol memoization.
//!
//! Once a V2 variant has answered for an `(auth, url)` endpoint, every other
//! variant short-circuits to "not served" without issuing a request. The memo
//! is first-writer-wins: concurrent successes race, exactly one binds, and a
//! stale read costs at most one wasted call.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::application::errors::FeedError;
use crate::domain::Credentials;

use super::{FeedRequest, V2Variant, VersionLister, VersionListing};

type EndpointKey = (String, String);

/// Maps `(auth key, feed url)` to the variant that answered there.
pub struct ProtocolMemo {
    bound: Mutex<HashMap<EndpointKey, V2Variant>>,
}

impl ProtocolMemo {
    pub fn new() -> Self {
        Self {
            bound: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `variant` may be tried against the endpoint: true while the
    /// endpoint is unbound or bound to this same variant.
    pub fn allows(&self, auth_key: &str, url: &str, variant: V2Variant) -> bool {
        let bound = self.bound.lock().expect("protocol memo poisoned");
        match bound.get(&(auth_key.to_string(), url.to_string())) {
            None => true,
            Some(active) => *active == variant,
        }
    }

    /// Bind the endpoint to `variant` unless another variant won first.
    pub fn bind(&self, auth_key: &str, url: &str, variant: V2Variant) {
        let mut bound = self.bound.lock().expect("protocol memo poisoned");
        bound
            .entry((auth_key.to_string(), url.to_string()))
            .or_insert(variant);
    }

    pub fn bound_variant(&self, auth_key: &str, url: &str) -> Option<V2Variant> {
        let bound = self.bound.lock().expect("protocol memo poisoned");
        bound.get(&(auth_key.to_string(), url.to_string())).copied()
    }
}

impl Default for ProtocolMemo {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a lister under the memo: skip when another variant owns the endpoint,
/// bind on the first non-`None` success. `None` outcomes never touch the memo.
pub async fn guarded_list(
    lister: &dyn VersionLister,
    request: &FeedRequest,
) -> Result<VersionListing, FeedError> {
    let auth_key = Credentials::memo_key(request.auth.as_ref());
    let memo = request.env.memo();
    let variant = lister.variant();

    if !memo.allows(&auth_key, &request.url, variant) {
        debug!(url = %request.url, ?variant, "endpoint bound to another protocol variant, skipping");
        return Ok(None);
    }

    let outcome = lister.list(request).await?;
    if outcome.is_some() {
        memo.bind(&auth_key, &request.url, variant);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_endpoint_allows_everything() {
        let memo = ProtocolMemo::new();
        assert!(memo.allows("", "http://feed", V2Variant::ODataFilter));
        assert!(memo.allows("", "http://feed", V2Variant::JsonVersions));
    }

    #[test]
    fn binding_locks_out_other_variants() {
        let memo = ProtocolMemo::new();
        memo.bind("", "http://feed", V2Variant::FindById);
        assert!(memo.allows("", "http://feed", V2Variant::FindById));
        assert!(!memo.allows("", "http://feed", V2Variant::ODataFilter));
    }

    #[test]
    fn first_binding_wins() {
        let memo = ProtocolMemo::new();
        memo.bind("", "http://feed", V2Variant::FindById);
        memo.bind("", "http://feed", V2Variant::ODataFilter);
        assert_eq!(memo.bound_variant("", "http://feed"), Some(V2Variant::FindById));
    }

    #[test]
    fn endpoints_are_keyed_by_auth_too() {
        let memo = ProtocolMemo::new();
        memo.bind("token:a", "http://feed", V2Variant::FindById);
        assert!(memo.allows("token:b", "http://feed", V2Variant::ODataFilter));
    }
}
