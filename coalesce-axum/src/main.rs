//! `coalesce-server`: the balance gateway over HTTP.
//!
//! ```text
//! coalesce-server [CONFIG.yaml]   serve; config path may also come from COALESCE_CONFIG
//! coalesce-server generate-key    print a fresh API key and exit
//! ```
//!
//! Generated keys are not stored anywhere; add them to `api_keys` in the
//! config file.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use coalesce::offload::OffloadManager;
use coalesce::{CredentialGate, CredentialRecord, Gateway, LookupCache, RateLimiter};
use coalesce_axum::{LogFormat, ServerConfig};
use coalesce_backend::{Backend, MemoryCredentialStore, generate_api_key};
use coalesce_redis::RedisBackend;
use coalesce_solana::SolanaRpcOrigin;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config() -> anyhow::Result<ServerConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("COALESCE_CONFIG").ok());
    let config = match path {
        Some(path) => ServerConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => ServerConfig::default(),
    };
    Ok(config.with_env()?)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("generate-key") {
        println!("{}", generate_api_key());
        return Ok(());
    }

    let config = load_config()?;
    init_tracing(config.log_format);

    let origin = SolanaRpcOrigin::builder()
        .url(&config.rpc_url)
        .build()
        .context("building RPC client")?;

    let store: MemoryCredentialStore = config
        .api_keys
        .iter()
        .map(CredentialRecord::active)
        .collect();
    if store.is_empty() {
        warn!("No API keys configured, every lookup will be rejected");
    }

    let offload = OffloadManager::new(config.offload.clone());
    let mut cache = LookupCache::new(origin, config.lookup.clone()).with_offload(offload.clone());
    let mut credentials =
        CredentialGate::new(store, config.credentials.clone()).with_offload(offload);

    match &config.redis_url {
        Some(url) => {
            let backend: Arc<dyn Backend> = Arc::new(
                RedisBackend::builder()
                    .server(url.as_str())
                    .build()
                    .context("invalid Redis URL")?,
            );
            cache = cache.with_mirror(Arc::clone(&backend));
            credentials = credentials.with_external(backend);
        }
        None => info!("No Redis configured, running with process-local caches only"),
    }

    let gateway = Arc::new(Gateway::from_parts(
        RateLimiter::new(config.rate_limit.clone()),
        credentials,
        cache,
    ));

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %config.listen, rpc = %config.rpc_url, "Gateway listening");

    let app = coalesce_axum::router(Arc::clone(&gateway));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    if !gateway.drain(DRAIN_TIMEOUT).await {
        warn!(timeout = ?DRAIN_TIMEOUT, "Background cache writes still running at exit");
    }
    info!("Gateway stopped");
    Ok(())
}
