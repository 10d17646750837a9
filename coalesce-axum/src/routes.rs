use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use coalesce::{ClientIdentity, Gateway, LookupRequest, OriginClient};
use coalesce_backend::CredentialStore;
use http::HeaderMap;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::response::{ApiError, BalanceRequest, BalanceResponse};

/// Header carrying the client credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state of every handler.
pub struct AppState<O, S> {
    /// The request pipeline.
    pub gateway: Arc<Gateway<O, S>>,
}

impl<O, S> Clone for AppState<O, S> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

/// Routes of the gateway, with request tracing.
pub fn router<O, S>(gateway: Arc<Gateway<O, S>>) -> Router
where
    O: OriginClient + 'static,
    S: CredentialStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/get-balance", post(get_balance::<O, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { gateway })
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}

async fn get_balance<O, S>(
    State(state): State<AppState<O, S>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<BalanceRequest>, JsonRejection>,
) -> Result<Json<BalanceResponse>, ApiError>
where
    O: OriginClient + 'static,
    S: CredentialStore + 'static,
{
    let Json(body) = payload.map_err(|rejection| {
        debug!(%peer, error = %rejection, "Rejecting unreadable body");
        ApiError::invalid_body()
    })?;

    let mut request = LookupRequest::new(ClientIdentity::from(peer.ip()), body.wallets);
    if let Some(credential) = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        request = request.credential(credential);
    }

    let results = state.gateway.lookup(request).await?;
    Ok(Json(BalanceResponse::new(results)))
}
