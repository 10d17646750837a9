//! The authoritative credential store.

use std::sync::Arc;

use async_trait::async_trait;
use coalesce_core::{CredentialRecord, StoreError};
use dashmap::DashMap;
use tracing::trace;

/// Durable store of client credentials.
///
/// `Ok(None)` means "no such credential" and must be reserved for that case;
/// connectivity or query failures are reported as [`StoreError`] so that the
/// gateway never turns an outage into a rejection.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Looks up the record for `token`.
    async fn find_credential(&self, token: &str) -> Result<Option<CredentialRecord>, StoreError>;
}

#[async_trait]
impl<T> CredentialStore for Arc<T>
where
    T: CredentialStore + ?Sized,
{
    async fn find_credential(&self, token: &str) -> Result<Option<CredentialRecord>, StoreError> {
        (**self).find_credential(token).await
    }
}

/// Credential store held in process memory.
///
/// The server seeds it from configuration; tests use it as the durable tier.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    records: Arc<DashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: CredentialRecord) {
        self.records.insert(record.key.clone(), record);
    }

    /// Marks a credential inactive. Returns `false` if it is unknown.
    pub fn deactivate(&self, key: &str) -> bool {
        match self.records.get_mut(key) {
            Some(mut record) => {
                record.active = false;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<CredentialRecord> for MemoryCredentialStore {
    fn from_iter<I: IntoIterator<Item = CredentialRecord>>(iter: I) -> Self {
        let store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_credential(&self, token: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let record = self.records.get(token).map(|record| record.clone());
        trace!(found = record.is_some(), "memory credential lookup");
        Ok(record)
    }
}

/// Generates a fresh credential: 32 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
