#![warn(missing_docs)]
//! HTTP front end for the coalesce gateway.
//!
//! [`router`] exposes a [`Gateway`](coalesce::Gateway) over axum:
//!
//! | Route                   | Purpose                                    |
//! |-------------------------|--------------------------------------------|
//! | `POST /api/get-balance` | batch lookup, `{"wallets": [...]}` body    |
//! | `GET /health`           | liveness probe                             |
//!
//! The client identity used for rate limiting is the peer IP address, so
//! the router must be served with
//! [`into_make_service_with_connect_info`](axum::Router::into_make_service_with_connect_info).
//! The credential travels in the [`API_KEY_HEADER`] header.
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! # async fn run<O, S>(gateway: Arc<coalesce::Gateway<O, S>>) -> std::io::Result<()>
//! # where O: coalesce::OriginClient + 'static, S: coalesce_backend::CredentialStore + 'static {
//! let app = coalesce_axum::router(gateway);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
//! # }
//! ```

pub mod config;
mod response;
mod routes;

pub use config::{ConfigError, LogFormat, ServerConfig};
pub use response::{ApiError, BalanceRequest, BalanceResponse, ErrorResponse, WalletBalance};
pub use routes::{API_KEY_HEADER, AppState, router};
