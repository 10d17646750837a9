use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use coalesce_backend::Backend;
use coalesce_core::{CacheEntry, CacheKey, OriginClient, OriginError, Subject};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::concurrency::InFlightGuards;
use crate::metrics;
use crate::offload::{OffloadManager, TimeoutPolicy};
use crate::policy::LookupPolicy;

/// How a resolved value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// A fresh entry was already cached.
    Hit,
    /// The entry was populated by a concurrent caller while this one waited
    /// for the in-flight guard.
    Coalesced,
    /// This caller performed the origin call.
    Miss,
}

impl LookupStatus {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Coalesced => "coalesced",
            Self::Miss => "miss",
        }
    }
}

impl fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TTL cache of subject values with single-flight origin access.
///
/// Fresh entries are served with a single shard read. A stale or absent
/// entry is refreshed by exactly one caller at a time: callers for the same
/// subject queue on a per-subject guard and re-check freshness once they
/// hold it, so a burst of concurrent misses collapses into one origin call.
///
/// Failures are never cached. Successful values are optionally mirrored to
/// an external [`Backend`] in the background.
pub struct LookupCache<O> {
    origin: O,
    entries: DashMap<Subject, CacheEntry>,
    in_flight: InFlightGuards<Subject>,
    mirror: Option<Arc<dyn Backend>>,
    offload: OffloadManager,
    policy: LookupPolicy,
    calls: AtomicU64,
}

impl<O> LookupCache<O>
where
    O: OriginClient,
{
    /// Create an empty cache in front of `origin`.
    pub fn new(origin: O, policy: LookupPolicy) -> Self {
        Self {
            origin,
            entries: DashMap::new(),
            in_flight: InFlightGuards::new(),
            mirror: None,
            offload: OffloadManager::with_defaults(),
            policy,
            calls: AtomicU64::new(0),
        }
    }

    /// Mirror every freshly resolved value to `backend`.
    pub fn with_mirror(self, backend: Arc<dyn Backend>) -> Self {
        Self {
            mirror: Some(backend),
            ..self
        }
    }

    /// Run mirror writes on a shared offload manager.
    pub fn with_offload(self, offload: OffloadManager) -> Self {
        Self { offload, ..self }
    }

    /// Resolve `subject`, from memory when fresh and from the origin otherwise.
    pub async fn resolve(&self, subject: &Subject) -> Result<f64, OriginError> {
        self.resolve_with_status(subject)
            .await
            .map(|(value, _)| value)
    }

    /// Like [`resolve`](Self::resolve), also reporting how the value was
    /// obtained.
    #[instrument(skip(self), fields(origin = self.origin.name()))]
    pub async fn resolve_with_status(
        &self,
        subject: &Subject,
    ) -> Result<(f64, LookupStatus), OriginError> {
        self.maybe_sweep();

        if let Some(value) = self.peek(subject) {
            metrics::record_lookup(LookupStatus::Hit);
            return Ok((value, LookupStatus::Hit));
        }

        let _guard = self.in_flight.acquire(subject).await;

        // Another holder may have refreshed the entry while we waited.
        if let Some(value) = self.peek(subject) {
            debug!("Served value populated by a concurrent lookup");
            metrics::record_lookup(LookupStatus::Coalesced);
            return Ok((value, LookupStatus::Coalesced));
        }

        metrics::record_lookup(LookupStatus::Miss);
        let value = self.fetch(subject).await?;
        self.store(subject, CacheEntry::observed_now(value));
        self.mirror(subject, value);
        Ok((value, LookupStatus::Miss))
    }

    async fn fetch(&self, subject: &Subject) -> Result<f64, OriginError> {
        let deadline = self.policy.origin_timeout;
        let start = Instant::now();

        let result = match tokio::time::timeout(deadline, self.origin.fetch(subject, deadline)).await
        {
            Ok(result) => result,
            Err(_) => Err(OriginError::Timeout {
                subject: subject.clone(),
                deadline,
            }),
        };

        metrics::record_origin(
            self.origin.name(),
            start.elapsed(),
            result.as_ref().err().map(OriginError::code),
        );
        if let Err(error) = &result {
            warn!(code = error.code(), %error, "Origin call failed");
        }
        result
    }

    fn store(&self, subject: &Subject, entry: CacheEntry) {
        match self.entries.entry(subject.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().observed_at() <= entry.observed_at() {
                    occupied.insert(entry);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }

    fn mirror(&self, subject: &Subject, value: f64) {
        let Some(backend) = self.mirror.clone() else {
            return;
        };
        let key = CacheKey::balance(subject);
        let ttl = self.policy.freshness;

        // At most one write per key in flight; a refresh that lands while the
        // previous write is pending is not mirrored.
        self.offload.spawn_keyed(
            key.clone(),
            TimeoutPolicy::Cancel(self.policy.mirror_timeout),
            async move {
                if let Err(error) = backend.write(&key, value.to_string(), Some(ttl)).await {
                    warn!(%key, backend = %backend.label(), %error, "Failed to mirror value");
                }
            },
        );
    }

    /// Fresh cached value for `subject`, without touching the origin.
    pub fn peek(&self, subject: &Subject) -> Option<f64> {
        let now = Instant::now();
        self.entries
            .get(subject)
            .filter(|entry| entry.is_fresh(self.policy.freshness, now))
            .map(|entry| entry.value().value())
    }

    /// Raw cached entry for `subject`, fresh or not.
    pub fn entry(&self, subject: &Subject) -> Option<CacheEntry> {
        self.entries.get(subject).map(|entry| *entry)
    }

    fn maybe_sweep(&self) {
        let every = self.policy.sweep_every;
        if every == 0 {
            return;
        }
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % every == 0 {
            self.sweep();
        }
    }

    /// Remove every entry older than the freshness window and release
    /// unreferenced in-flight guards. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.policy.freshness;
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let keep = entry.is_fresh(window, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.in_flight.prune();

        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Swept stale entries");
            metrics::record_evicted(removed);
        }
        removed
    }

    /// Number of cached entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subjects that currently have an in-flight guard.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// The offload manager running mirror writes.
    pub fn offload(&self) -> &OffloadManager {
        &self.offload
    }

    /// The policy this cache was built with.
    pub fn policy(&self) -> &LookupPolicy {
        &self.policy
    }
}

impl<O> fmt::Debug for LookupCache<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupCache")
            .field("entries", &self.entries.len())
            .field("in_flight", &self.in_flight)
            .field("mirror", &self.mirror.as_ref().map(|backend| backend.label()))
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use coalesce_backend::MemoryBackend;

    use super::*;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OriginClient for Counting {
        async fn fetch(&self, subject: &Subject, _deadline: Duration) -> Result<f64, OriginError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(OriginError::Remote {
                    subject: subject.clone(),
                    reason: "unavailable".into(),
                });
            }
            Ok(call as f64)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_are_served_from_memory() {
        let cache = LookupCache::new(Counting::default(), LookupPolicy::default());
        let subject = Subject::new("alice");

        assert_eq!(
            cache.resolve_with_status(&subject).await,
            Ok((1.0, LookupStatus::Miss))
        );
        assert_eq!(
            cache.resolve_with_status(&subject).await,
            Ok((1.0, LookupStatus::Hit))
        );

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.resolve(&subject).await, Ok(2.0));
        assert_eq!(cache.origin.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_cached() {
        let origin = Counting {
            fail: true,
            ..Default::default()
        };
        let cache = LookupCache::new(origin, LookupPolicy::default());
        let subject = Subject::new("bob");

        assert!(cache.resolve(&subject).await.is_err());
        assert!(cache.resolve(&subject).await.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight_len(), 0);
        assert_eq!(cache.origin.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_stale_entries() {
        let cache = LookupCache::new(Counting::default(), LookupPolicy::default());
        cache.resolve(&Subject::new("old")).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.resolve(&Subject::new("new")).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(cache.sweep(), 1);
        assert!(cache.entry(&Subject::new("old")).is_none());
        assert!(cache.entry(&Subject::new("new")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_runs_every_nth_call() {
        let policy = LookupPolicy::default().sweep_every(3);
        let cache = LookupCache::new(Counting::default(), policy);
        cache.resolve(&Subject::new("a")).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        cache.resolve(&Subject::new("b")).await.unwrap();
        assert_eq!(cache.len(), 2);
        cache.resolve(&Subject::new("b")).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_values_are_mirrored() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = LookupCache::new(Counting::default(), LookupPolicy::default())
            .with_mirror(backend.clone());
        let subject = Subject::new("carol");

        cache.resolve(&subject).await.unwrap();
        cache.offload().wait_all().await;

        let stored = backend.read(&CacheKey::balance(&subject)).await.unwrap();
        assert_eq!(stored.as_deref(), Some("1"));
    }
}
