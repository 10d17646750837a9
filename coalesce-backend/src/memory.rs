//! Process-local [`Backend`] over a concurrent map.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coalesce_core::{BackendLabel, CacheKey};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::{Backend, BackendResult, DeleteStatus};

#[derive(Debug, Clone)]
struct Stored {
    value: String,
    expires_at: Option<Instant>,
}

impl Stored {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory backend with per-entry TTL.
///
/// Expired entries are dropped lazily on read. Clones share the same map,
/// which makes it usable as a stand-in for a shared external cache in a
/// single process.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    entries: Arc<DashMap<CacheKey, Stored>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<String>> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.value.clone());
        if value.is_none() {
            self.entries.remove_if(key, |_, stored| !stored.is_live(now));
        }
        Ok(value)
    }

    async fn write(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Option<Duration>,
    ) -> BackendResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.clone(), Stored { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        match self.entries.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("memory")
    }
}
