//! JSON-RPC wire types for `getBalance`.

use std::time::Duration;

use coalesce_core::{OriginError, Subject};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (&'a str, RpcConfig<'a>),
}

#[derive(Debug, Serialize)]
struct RpcConfig<'a> {
    commitment: &'a str,
}

impl<'a> RpcRequest<'a> {
    pub(crate) fn get_balance(address: &'a str, commitment: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method: "getBalance",
            params: (address, RpcConfig { commitment }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    result: Option<BalanceResult>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcResponse {
    /// Lamports carried by the response, or the error it reports.
    pub(crate) fn into_lamports(self) -> Result<u64, RpcError> {
        if let Some(error) = self.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .map(|result| result.value)
            .ok_or(RpcError::MissingResult)
    }
}

/// Failure of a single `getBalance` exchange.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a non-success HTTP status.
    #[error("rpc node returned HTTP {0}")]
    Status(StatusCode),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Message reported by the node.
        message: String,
    },

    /// The response had neither `result` nor `error`.
    #[error("rpc response carried no result")]
    MissingResult,
}

impl RpcError {
    /// Whether the exchange was cut short by the request deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(error) if error.is_timeout())
    }

    /// Map onto the origin failure kinds.
    pub fn into_origin(self, subject: &Subject, deadline: Duration) -> OriginError {
        if self.is_timeout() {
            return OriginError::Timeout {
                subject: subject.clone(),
                deadline,
            };
        }
        OriginError::Remote {
            subject: subject.clone(),
            reason: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_matches_json_rpc_shape() {
        let body = serde_json::to_value(RpcRequest::get_balance("abc", "finalized")).unwrap();
        assert_eq!(
            body,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getBalance",
                "params": ["abc", {"commitment": "finalized"}],
            })
        );
    }

    #[test]
    fn response_error_wins_over_result() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "Invalid param"},
        }))
        .unwrap();
        let error = response.into_lamports().unwrap_err();
        assert_eq!(error.to_string(), "rpc error -32602: Invalid param");
        assert!(!error.is_timeout());
    }

    #[test]
    fn empty_response_is_an_error() {
        let response: RpcResponse = serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();
        assert!(matches!(response.into_lamports(), Err(RpcError::MissingResult)));
    }
}
