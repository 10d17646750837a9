//! Server configuration.
//!
//! Loaded from a YAML file, then overridden by environment variables:
//!
//! | Variable          | Field       |
//! |-------------------|-------------|
//! | `COALESCE_LISTEN` | `listen`    |
//! | `SOLANA_RPC_URL`  | `rpc_url`   |
//! | `REDIS_URL`       | `redis_url` |
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! rpc_url: https://api.mainnet-beta.solana.com
//! redis_url: redis://127.0.0.1/
//! log_format: json
//! api_keys:
//!   - 6a1f0c2e8b3d4f5a9c7e0d1b2a3c4d5e
//! lookup:
//!   freshness: 10s
//! rate_limit:
//!   capacity: 10
//!   refill_tokens: 10
//!   refill_interval: 1m
//! credentials:
//!   valid_ttl: 15m
//!   invalid_ttl: 5m
//! offload:
//!   max_concurrent_tasks: 1024
//! ```
//!
//! `api_keys` is the only durable home of credentials: `coalesce-server
//! generate-key` prints a key, and it takes effect once added here and the
//! server restarts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use coalesce::offload::OffloadConfig;
use coalesce::{CredentialPolicy, LookupPolicy, RateLimitPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`ServerConfig::listen`].
pub const LISTEN_ENV: &str = "COALESCE_LISTEN";
/// Environment variable overriding [`ServerConfig::rpc_url`].
pub const RPC_URL_ENV: &str = "SOLANA_RPC_URL";
/// Environment variable overriding [`ServerConfig::redis_url`].
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid YAML for [`ServerConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_saphyr::Error),
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Everything `coalesce-server` needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen: SocketAddr,
    /// Solana JSON-RPC endpoint.
    pub rpc_url: String,
    /// Shared external cache. Without it, values and verdicts stay local.
    pub redis_url: Option<String>,
    /// Credentials accepted by the in-memory store.
    pub api_keys: Vec<String>,
    /// Log output format.
    pub log_format: LogFormat,
    /// Lookup cache behaviour.
    pub lookup: LookupPolicy,
    /// Per-client admission.
    pub rate_limit: RateLimitPolicy,
    /// Credential verdict caching.
    pub credentials: CredentialPolicy,
    /// Background cache writes.
    pub offload: OffloadConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rpc_url: coalesce_solana::DEFAULT_RPC_URL.to_owned(),
            redis_url: None,
            api_keys: Vec::new(),
            log_format: LogFormat::default(),
            lookup: LookupPolicy::default(),
            rate_limit: RateLimitPolicy::default(),
            credentials: CredentialPolicy::default(),
            offload: OffloadConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides looked up through `lookup`. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(LISTEN_ENV) {
            self.listen = value.trim().parse().map_err(|error: std::net::AddrParseError| {
                ConfigError::InvalidEnv {
                    var: LISTEN_ENV,
                    value: value.clone(),
                    reason: error.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup(RPC_URL_ENV) {
            self.rpc_url = value;
        }
        if let Some(value) = lookup(REDIS_URL_ENV) {
            self.redis_url = Some(value);
        }
        Ok(self)
    }
}
