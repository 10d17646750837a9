use std::time::Duration;

use async_trait::async_trait;
use coalesce_core::{BackendLabel, CacheKey};

use crate::{BackendError, DeleteStatus};

pub type BackendResult<T> = Result<T, BackendError>;

/// A shared key-value cache reachable over the network.
///
/// The gateway treats every backend as best effort: reads that fail are
/// treated as misses and writes that fail are logged and dropped. Callers
/// bound each operation with their own deadline, so implementations do not
/// need internal timeouts.
#[async_trait]
pub trait Backend: Sync + Send {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<String>>;

    async fn write(&self, key: &CacheKey, value: String, ttl: Option<Duration>)
    -> BackendResult<()>;

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus>;

    /// Returns the label of this backend for logs and metrics.
    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("backend")
    }
}
