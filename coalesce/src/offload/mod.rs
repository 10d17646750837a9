//! Offload manager for background task execution.
//!
//! Writes to the shared external cache never sit on the request path: the
//! lookup cache mirrors freshly resolved values and the credential gate
//! back-fills verdicts through an [`OffloadManager`]. Each task carries its
//! own timeout and nobody awaits its result; failures are logged.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use coalesce::offload::{OffloadManager, TimeoutPolicy};
//!
//! let manager = OffloadManager::with_defaults();
//!
//! manager.spawn("mirror", TimeoutPolicy::Cancel(Duration::from_secs(5)), async {
//!     // Write to the external cache here
//! });
//! ```

mod manager;
mod policy;

pub use manager::{OffloadKey, OffloadManager};
pub use policy::{OffloadConfig, TimeoutPolicy};
