use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coalesce_backend::{Backend, BackendError, BackendResult, DeleteStatus};
use coalesce_core::{BackendLabel, CacheKey};
use dashmap::DashMap;

/// External cache double. TTLs are recorded but not enforced.
#[derive(Clone, Debug)]
pub struct MockBackend {
    entries: Arc<DashMap<CacheKey, (String, Option<Duration>)>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            reads: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
            latency_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make every operation fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries.get(key).map(|entry| entry.0.clone())
    }

    pub fn ttl(&self, key: &CacheKey) -> Option<Duration> {
        self.entries.get(key).and_then(|entry| entry.1)
    }

    pub fn insert(&self, key: CacheKey, value: impl Into<String>) {
        self.entries.insert(key, (value.into(), None));
    }

    /// Reads attempted, including failed ones.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Writes attempted, including failed ones.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn cache_entry_count(&self) -> usize {
        self.entries.len()
    }

    async fn simulate(&self) -> BackendResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::ConnectionError(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock backend offline",
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self.get(key))
    }

    async fn write(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Option<Duration>,
    ) -> BackendResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        self.entries.insert(key.clone(), (value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        self.simulate().await?;
        match self.entries.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("mock")
    }
}
