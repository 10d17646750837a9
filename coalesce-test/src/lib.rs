//! Test doubles and fixtures shared by the coalesce integration tests and
//! benchmarks.
//!
//! - [`MockOrigin`](mock_origin::MockOrigin) counts calls per subject and can
//!   inject latency and failures.
//! - [`MockBackend`](mock_backend::MockBackend) is an external cache that can be
//!   switched offline or made slow.
//! - [`MockStore`](mock_store::MockStore) is a credential store with call
//!   counters and fault injection.

pub mod fixtures;
pub mod mock_backend;
pub mod mock_origin;
pub mod mock_store;
pub mod tracing;
