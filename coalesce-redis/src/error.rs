//! Error types for Redis backend operations.
//!
//! Every error converts into [`BackendError`], which is what the gateway
//! sees. Connection problems map to [`BackendError::ConnectionError`] so they
//! can be told apart from protocol or type errors in logs.

use coalesce_backend::BackendError;
use redis::RedisError;

/// Error type for Redis backend operations.
///
/// Appears when [`RedisBackendBuilder::build`] gets an invalid connection URL,
/// when the first command cannot establish the lazy connection, or when the
/// server rejects a command.
///
/// [`RedisBackendBuilder::build`]: crate::RedisBackendBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis backend error: {0}")]
    Redis(#[from] RedisError),
}

impl Error {
    /// Whether the error came from the network rather than the server.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Redis(error) => {
                error.is_io_error() || error.is_connection_refusal() || error.is_timeout()
            }
        }
    }
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        if error.is_connection() {
            Self::ConnectionError(Box::new(error))
        } else {
            Self::InternalError(Box::new(error))
        }
    }
}
