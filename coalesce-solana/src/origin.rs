use std::time::Duration;

use async_trait::async_trait;
use coalesce_core::{OriginClient, OriginError, Subject};
use reqwest::Client;
use tracing::{debug, trace, warn};

use crate::address::is_valid_address;
use crate::rpc::{RpcError, RpcRequest, RpcResponse};

/// Public mainnet endpoint used when no URL is configured.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// [`OriginClient`] resolving account addresses to SOL balances over JSON-RPC.
#[derive(Debug, Clone)]
pub struct SolanaRpcOrigin {
    client: Client,
    url: String,
    commitment: String,
    name: String,
}

impl SolanaRpcOrigin {
    /// Origin talking to `url` with default settings.
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::builder().url(url).build()
    }

    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> SolanaRpcOriginBuilder {
        SolanaRpcOriginBuilder::default()
    }

    /// Endpoint this origin calls.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get_balance(&self, address: &str, deadline: Duration) -> Result<u64, RpcError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(deadline)
            .json(&RpcRequest::get_balance(address, &self.commitment))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status(status));
        }
        response.json::<RpcResponse>().await?.into_lamports()
    }
}

#[async_trait]
impl OriginClient for SolanaRpcOrigin {
    async fn fetch(&self, subject: &Subject, deadline: Duration) -> Result<f64, OriginError> {
        if !is_valid_address(subject.as_str()) {
            debug!(%subject, "Rejecting malformed address");
            return Err(OriginError::MalformedSubject(subject.clone()));
        }

        match self.get_balance(subject.as_str(), deadline).await {
            Ok(lamports) => {
                trace!(%subject, lamports, "getBalance");
                Ok(lamports as f64 / LAMPORTS_PER_SOL)
            }
            Err(error) => {
                warn!(%subject, url = %self.url, %error, "getBalance failed");
                Err(error.into_origin(subject, deadline))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`SolanaRpcOrigin`].
#[derive(Debug, Clone)]
pub struct SolanaRpcOriginBuilder {
    url: String,
    commitment: String,
    name: String,
    client: Option<Client>,
}

impl Default for SolanaRpcOriginBuilder {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_owned(),
            commitment: "finalized".to_owned(),
            name: "solana".to_owned(),
            client: None,
        }
    }
}

impl SolanaRpcOriginBuilder {
    /// RPC endpoint URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Commitment level sent with every request.
    pub fn commitment(mut self, commitment: impl Into<String>) -> Self {
        self.commitment = commitment.into();
        self
    }

    /// Name used in logs and metrics labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reuse an existing HTTP client and its connection pool.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the origin.
    pub fn build(self) -> Result<SolanaRpcOrigin, RpcError> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };
        Ok(SolanaRpcOrigin {
            client,
            url: self.url,
            commitment: self.commitment,
            name: self.name,
        })
    }
}
