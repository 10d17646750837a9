#![warn(missing_docs)]
//! # coalesce-core
//!
//! Core traits and types shared by every crate of the coalesce gateway.
//!
//! The gateway fronts a slow, rate-limited balance oracle. This crate defines
//! the vocabulary the rest of the workspace speaks:
//!
//! - [`Subject`] and [`ClientIdentity`] - what is looked up, and who asks
//! - [`CacheKey`] - namespaced keys written to external caches
//! - [`CacheEntry`] - a resolved value together with the instant it was observed
//! - [`OriginClient`] - the leaf call resolving a subject against the oracle
//! - [`Verdict`] and [`CredentialVerdict`] - credential validity, as cached
//! - [`CredentialRecord`] - the durable record a credential verdict derives from

pub mod credential;
pub mod entry;
pub mod key;
pub mod label;
pub mod origin;
pub mod subject;

pub use credential::{CredentialRecord, CredentialVerdict, StoreError, UnknownVerdict, Verdict};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use label::BackendLabel;
pub use origin::{OriginClient, OriginError};
pub use subject::{ClientIdentity, Subject};

#[doc(hidden)]
pub use smol_str::SmolStr;
