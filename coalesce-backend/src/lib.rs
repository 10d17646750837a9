// #![warn(missing_docs)]
//! Traits and structs for talking to the stores behind the gateway.
//!
//! Two collaborators live here:
//!
//! - [`Backend`] - a shared, networked key-value cache (Redis in production)
//!   used for best-effort mirroring of resolved values and credential verdicts.
//! - [`CredentialStore`] - the authoritative store of client credentials.
//!
//! In-memory implementations of both ([`MemoryBackend`],
//! [`MemoryCredentialStore`]) back local development and tests.
mod backend;
mod memory;
mod store;

pub use backend::{Backend, BackendResult};
pub use memory::MemoryBackend;
pub use store::{CredentialStore, MemoryCredentialStore, generate_api_key};
use std::time::Duration;
use thiserror::Error;

/// Proxy Error describes general groups of errors in backend interaction process.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal backend error, state or computation error.
    ///
    /// Any error not bounded with network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    /// Network interaction error.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),
    /// The operation did not finish within its deadline.
    #[error("backend operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Status of deleting result.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}
