use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coalesce_backend::{CredentialStore, MemoryCredentialStore};
use coalesce_core::{CredentialRecord, StoreError};

/// Credential store double with call counting and fault injection.
#[derive(Clone, Debug, Default)]
pub struct MockStore {
    records: MemoryCredentialStore,
    calls: Arc<AtomicUsize>,
    faulty: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one active record per key.
    pub fn with_active<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for key in keys {
            store.insert(CredentialRecord::active(key));
        }
        store
    }

    pub fn insert(&self, record: CredentialRecord) {
        self.records.insert(record);
    }

    pub fn deactivate(&self, key: &str) -> bool {
        self.records.deactivate(key)
    }

    /// Make every lookup fail with [`StoreError::Unavailable`].
    pub fn set_faulty(&self, faulty: bool) {
        self.faulty.store(faulty, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MockStore {
    async fn find_credential(&self, token: &str) -> Result<Option<CredentialRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.faulty.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock store offline".into()));
        }
        self.records.find_credential(token).await
    }
}
