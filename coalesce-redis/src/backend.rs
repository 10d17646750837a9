//! Redis backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use coalesce_backend::{Backend, BackendError, BackendResult, DeleteStatus};
use coalesce_core::{BackendLabel, CacheKey};
use redis::{Client, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::Error;

/// Redis cache backend based on the redis-rs crate.
///
/// The [`ConnectionManager`] is created on first use and reconnects on its
/// own afterwards, so building a backend never touches the network.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    name: BackendLabel,
}

impl RedisBackend {
    /// Create a backend pointing at `redis://127.0.0.1/`.
    pub fn new() -> Result<Self, BackendError> {
        Ok(Self::builder().build()?)
    }

    /// Creates new RedisBackend builder with default settings.
    #[must_use]
    pub fn builder() -> RedisBackendBuilder {
        RedisBackendBuilder::default()
    }

    /// Create lazy connection to redis via [`ConnectionManager`]
    pub async fn connection(&self) -> Result<&ConnectionManager, BackendError> {
        trace!("Get connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!("Initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await
            .map_err(Error::from)?;
        Ok(manager)
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("name", &self.name)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

/// Part of builder pattern implementation for RedisBackend.
#[derive(Debug, Clone)]
pub struct RedisBackendBuilder {
    connection_info: String,
    name: BackendLabel,
}

impl Default for RedisBackendBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
            name: BackendLabel::new_static("redis"),
        }
    }
}

impl RedisBackendBuilder {
    /// Set connection info (host, port, database, etc.) for RedisBackend.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Set a custom name for this backend, used in logs and metrics.
    pub fn name(mut self, name: impl Into<BackendLabel>) -> Self {
        self.name = name.into();
        self
    }

    /// Create new instance of Redis backend with passed settings.
    ///
    /// Only the URL is validated here; the connection is opened lazily.
    pub fn build(self) -> Result<RedisBackend, Error> {
        Ok(RedisBackend {
            client: Client::open(self.connection_info)?,
            connection: OnceCell::new(),
            name: self.name,
        })
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<String>> {
        let mut con = self.connection().await?.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key.to_string())
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        trace!(%key, hit = value.is_some(), "GET");
        Ok(value)
    }

    async fn write(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Option<Duration>,
    ) -> BackendResult<()> {
        let mut con = self.connection().await?.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key.to_string()).arg(value);
        // PX 0 is rejected by the server; sub-millisecond TTLs round up.
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        cmd.query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        trace!(%key, ttl_ms = ttl.map(|ttl| ttl.as_millis() as u64), "SET");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        let mut con = self.connection().await?.clone();
        let deleted: u32 = redis::cmd("DEL")
            .arg(key.to_string())
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    fn label(&self) -> BackendLabel {
        self.name.clone()
    }
}
