use std::sync::Arc;

use coalesce::offload::OffloadManager;
use coalesce::{
    CredentialGate, CredentialPolicy, Gateway, LookupCache, LookupPolicy, LookupRequest,
    RateLimitPolicy, RateLimiter,
};

use crate::mock_backend::MockBackend;
use crate::mock_origin::MockOrigin;
use crate::mock_store::MockStore;

/// Credential known to the store of every [`Harness`].
pub const API_KEY: &str = "0f4c6b1e9d2a4c7f8e3b5a6d9c0e1f2a";

/// A gateway wired to mocks, with handles to each mock for assertions.
pub struct Harness {
    pub origin: MockOrigin,
    pub backend: MockBackend,
    pub store: MockStore,
    pub gateway: Arc<Gateway<MockOrigin, MockStore>>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policies(
            LookupPolicy::default(),
            RateLimitPolicy::default(),
            CredentialPolicy::default(),
        )
    }

    pub fn with_policies(
        lookup: LookupPolicy,
        rate_limit: RateLimitPolicy,
        credential: CredentialPolicy,
    ) -> Self {
        let origin = MockOrigin::new();
        let backend = MockBackend::new();
        let store = MockStore::with_active([API_KEY]);
        let offload = OffloadManager::with_defaults();

        let cache = LookupCache::new(origin.clone(), lookup)
            .with_mirror(Arc::new(backend.clone()))
            .with_offload(offload.clone());
        let credentials = CredentialGate::new(store.clone(), credential)
            .with_external(Arc::new(backend.clone()))
            .with_offload(offload);
        let gateway = Gateway::from_parts(RateLimiter::new(rate_limit), credentials, cache);

        Self {
            origin,
            backend,
            store,
            gateway: Arc::new(gateway),
        }
    }

    /// An authenticated request from `identity`.
    pub fn request<I, S>(&self, identity: &str, subjects: I) -> LookupRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LookupRequest::new(identity, subjects).credential(API_KEY)
    }
}
