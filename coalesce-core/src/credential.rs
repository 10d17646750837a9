//! Credential verdicts and the durable records they are derived from.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Outcome of checking a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The credential matches an active record.
    Valid,
    /// No active record matches the credential.
    Invalid,
}

impl Verdict {
    /// Wire representation used in external caches.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }

    /// Whether the credential was accepted.
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an external cache holds something other than a verdict.
#[derive(Debug, Error)]
#[error("unrecognized verdict: {0:?}")]
pub struct UnknownVerdict(pub String);

impl FromStr for Verdict {
    type Err = UnknownVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            other => Err(UnknownVerdict(other.to_owned())),
        }
    }
}

/// A verdict together with the instant it stops being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialVerdict {
    status: Verdict,
    expires_at: Instant,
}

impl CredentialVerdict {
    /// Creates a verdict trusted for `ttl` from now.
    pub fn new(status: Verdict, ttl: Duration) -> Self {
        Self {
            status,
            expires_at: Instant::now() + ttl,
        }
    }

    /// The cached verdict.
    #[inline]
    pub fn status(&self) -> Verdict {
        self.status
    }

    /// When the verdict expires.
    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the verdict can no longer be served at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// A credential as kept by the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The credential itself.
    pub key: String,
    /// Inactive records never validate.
    pub active: bool,
    /// Creation time of the record.
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Creates an active record stamped with the current time.
    pub fn active(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Verdict this record yields for a lookup of its key.
    pub fn verdict(&self) -> Verdict {
        if self.active {
            Verdict::Valid
        } else {
            Verdict::Invalid
        }
    }
}

/// Failure of the authoritative credential store.
///
/// Kept apart from [`Verdict::Invalid`]: "the store is down" must never be
/// reported as "your credential was rejected".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store answered with an error or could not be reached.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the deadline.
    #[error("credential store timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Stable machine readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
            Self::Timeout(_) => "store_timeout",
        }
    }
}
