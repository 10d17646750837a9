#![warn(missing_docs)]
//! Redis external cache for the coalesce gateway.
//!
//! [`RedisBackend`] implements [`coalesce_backend::Backend`] on top of a
//! lazily established [`ConnectionManager`](redis::aio::ConnectionManager).
//! Values are stored as plain strings under their rendered [`CacheKey`], so
//! other processes sharing the same Redis can read them without this crate:
//!
//! ```text
//! balance:<subject>   -> "1.25"          (expires after the freshness window)
//! api_key:<token>     -> "valid"|"invalid"
//! ```
//!
//! [`CacheKey`]: coalesce_core::CacheKey
//!
//! # Example
//!
//! ```no_run
//! use coalesce_redis::RedisBackend;
//!
//! # fn main() -> Result<(), coalesce_redis::error::Error> {
//! let backend = RedisBackend::builder()
//!     .server("redis://127.0.0.1:6379/0")
//!     .name("shared")
//!     .build()?;
//! # let _ = backend;
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod error;

#[doc(inline)]
pub use crate::backend::{RedisBackend, RedisBackendBuilder};
