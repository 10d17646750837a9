//! The origin: the slow oracle every cache miss ends up at.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::Subject;

/// Failure kinds an origin call can report.
///
/// The split matters to callers: [`MalformedSubject`](Self::MalformedSubject)
/// means "fix your input", while [`Remote`](Self::Remote) and
/// [`Timeout`](Self::Timeout) mean "retry later".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OriginError {
    /// The subject is not a well-formed identifier for this origin.
    #[error("invalid subject format: {0}")]
    MalformedSubject(Subject),

    /// The origin answered with an error or could not be reached.
    #[error("failed to resolve {subject}: {reason}")]
    Remote {
        /// Subject that was being resolved.
        subject: Subject,
        /// Human readable cause.
        reason: String,
    },

    /// The origin did not answer within the deadline.
    #[error("origin call for {subject} timed out after {deadline:?}")]
    Timeout {
        /// Subject that was being resolved.
        subject: Subject,
        /// Deadline that was exceeded.
        deadline: Duration,
    },
}

impl OriginError {
    /// Stable machine readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedSubject(_) => "malformed_subject",
            Self::Remote { .. } => "remote_failure",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MalformedSubject(_))
    }
}

/// Resolves a subject to a numeric quantity.
///
/// Implementations perform exactly one remote call per invocation and must
/// honour `deadline`. The caching layer additionally enforces the deadline
/// with its own timer, so an implementation that ignores it still cannot
/// block a caller forever.
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Fetches the current value for `subject`.
    async fn fetch(&self, subject: &Subject, deadline: Duration) -> Result<f64, OriginError>;

    /// Name used in logs and metrics labels.
    fn name(&self) -> &str {
        "origin"
    }
}

#[async_trait]
impl<T> OriginClient for Arc<T>
where
    T: OriginClient + ?Sized,
{
    async fn fetch(&self, subject: &Subject, deadline: Duration) -> Result<f64, OriginError> {
        (**self).fetch(subject, deadline).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
