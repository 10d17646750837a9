//! Request and response bodies, and the mapping of gateway errors onto HTTP.

use std::time::Duration;

use axum::Json;
use axum::response::{IntoResponse, Response};
use coalesce::{GatewayError, RequestError, SubjectResult};
use http::{HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/get-balance`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceRequest {
    /// Account addresses to look up. A missing field counts as empty.
    #[serde(default)]
    pub wallets: Vec<String>,
}

/// One entry of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// The address as looked up, trimmed.
    pub address: String,
    /// Balance in SOL; zero when `error` is set.
    pub balance: f64,
    /// Why this address could not be resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine readable form of `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<SubjectResult> for WalletBalance {
    fn from(result: SubjectResult) -> Self {
        Self {
            balance: result.value(),
            error: result.error().map(ToString::to_string),
            code: result.error().map(|error| error.code().to_owned()),
            address: result.subject.to_string(),
        }
    }
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Always `true`.
    pub success: bool,
    /// One entry per requested address, in request order.
    pub data: Vec<WalletBalance>,
}

impl BalanceResponse {
    /// Wrap batch results.
    pub fn new(results: Vec<SubjectResult>) -> Self {
        Self {
            success: true,
            data: results.into_iter().map(WalletBalance::from).collect(),
        }
    }
}

/// Failed response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human readable reason.
    pub message: String,
    /// Machine readable reason.
    pub code: String,
}

/// A request-level failure, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after: Option<Duration>,
}

impl ApiError {
    /// The request body was not valid JSON for [`BalanceRequest`].
    pub fn invalid_body() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_body",
            message: "Invalid request body".to_owned(),
            retry_after: None,
        }
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine readable reason.
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        let code = error.code();
        let (status, message, retry_after) = match &error {
            GatewayError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_owned(),
                Some(*retry_after),
            ),
            GatewayError::MissingCredential => {
                (StatusCode::UNAUTHORIZED, "API key is required".to_owned(), None)
            }
            GatewayError::InvalidCredential => {
                (StatusCode::UNAUTHORIZED, "Invalid API key".to_owned(), None)
            }
            GatewayError::CredentialStore(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Credential store unavailable".to_owned(),
                None,
            ),
            GatewayError::Request(request) => {
                let message = match request {
                    RequestError::Empty => "No wallets provided".to_owned(),
                    RequestError::TooMany { max, .. } => format!("Too many wallets (max {max})"),
                    RequestError::NoValidSubjects => "No valid wallets provided".to_owned(),
                };
                (StatusCode::BAD_REQUEST, message, None)
            }
        };
        Self {
            status,
            code,
            message,
            retry_after,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: self.message,
            code: self.code.to_owned(),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            // Whole seconds, rounded up so a client never retries too early.
            let secs = retry_after
                .as_secs()
                .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
