use std::time::Duration;

use coalesce_core::StoreError;
use thiserror::Error;

use crate::request::RequestError;

/// Request-level failures of [`Gateway::lookup`](crate::Gateway::lookup).
///
/// Per-subject origin failures are not here: they are reported inside the
/// batch result so that one subject never fails its siblings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The caller's token bucket is empty.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the next token is available.
        retry_after: Duration,
    },
    /// No credential was presented.
    #[error("credential required")]
    MissingCredential,
    /// The credential is unknown or inactive.
    #[error("invalid credential")]
    InvalidCredential,
    /// The credential could not be checked because the store failed.
    #[error("credential store unavailable: {0}")]
    CredentialStore(#[from] StoreError),
    /// The request itself was malformed.
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl GatewayError {
    /// Stable machine readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::CredentialStore(err) => err.code(),
            Self::Request(err) => err.code(),
        }
    }

    /// Whether the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::CredentialStore(_))
    }
}
