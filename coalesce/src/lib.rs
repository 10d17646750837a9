#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # coalesce
//!
//! A caching and admission-control layer in front of a slow, rate-limited
//! balance oracle.
//!
//! A request flows through four components, each an owned instance shared
//! through `Arc`:
//!
//! 1. [`RateLimiter`] admits or rejects the caller by identity.
//! 2. [`CredentialGate`] validates the caller's credential against a local
//!    cache, a shared external cache and finally the durable store.
//! 3. [`BatchResolver`] fans the requested subjects out concurrently.
//! 4. [`LookupCache`] answers each subject from memory or collapses concurrent
//!    misses into a single origin call.
//!
//! [`Gateway`] wires the four together.

/// Per-subject in-flight guards.
///
/// Guarantees that at most one task executes the
/// "stale → fetch → populate" section for a subject at any time.
pub mod concurrency;

/// Error types surfaced by the gateway.
pub mod error;

/// Concurrent fan-out over a batch of subjects.
pub mod batch;

/// Two-tier cache of credential verdicts with negative caching.
pub mod credential;

/// The request pipeline: admission, credential check, resolution.
pub mod gateway;

/// TTL cache with single-flight origin access.
pub mod lookup;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for cache hits and misses, origin latency, rejected
/// admissions, credential verdict sources and background tasks.
pub mod metrics;

/// Background task offloading for fire-and-forget cache writes.
pub mod offload;

/// Tunables for every component, with `serde` support.
pub mod policy;

/// Per-identity token buckets.
pub mod rate_limit;

/// Normalization of incoming subject lists.
pub mod request;

pub use batch::{BatchResolver, SubjectResult};
pub use credential::{CredentialGate, VerdictSource};
pub use error::GatewayError;
pub use gateway::{Gateway, LookupRequest};
pub use lookup::{LookupCache, LookupStatus};
pub use offload::OffloadManager;
pub use policy::{CredentialPolicy, LookupPolicy, RateLimitPolicy};
pub use rate_limit::{Admission, RateBucket, RateLimiter};
pub use request::{MAX_SUBJECTS, RequestError, SubjectBatch};

pub use coalesce_core::{
    BackendLabel, CacheEntry, CacheKey, ClientIdentity, CredentialRecord, CredentialVerdict,
    OriginClient, OriginError, StoreError, Subject, Verdict,
};

/// The `coalesce` prelude.
///
/// ```rust
/// use coalesce::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ClientIdentity, Gateway, GatewayError, LookupCache, LookupRequest, OriginClient,
        OriginError, RateLimiter, Subject,
    };
}
