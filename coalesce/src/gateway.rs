use std::sync::Arc;
use std::time::Duration;

use coalesce_backend::CredentialStore;
use coalesce_core::{ClientIdentity, OriginClient, Verdict};
use tracing::{debug, instrument};

use crate::batch::{BatchResolver, SubjectResult};
use crate::credential::CredentialGate;
use crate::error::GatewayError;
use crate::lookup::LookupCache;
use crate::rate_limit::{Admission, RateLimiter};
use crate::request::SubjectBatch;

/// A batch lookup as received at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Who is calling, usually derived from the peer address.
    pub identity: ClientIdentity,
    /// The presented credential, if any.
    pub credential: Option<String>,
    /// Raw subject identifiers, not yet normalized.
    pub subjects: Vec<String>,
}

impl LookupRequest {
    /// A request from `identity` for `subjects`.
    pub fn new<I, S>(identity: impl Into<ClientIdentity>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity: identity.into(),
            credential: None,
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a credential.
    pub fn credential(self, credential: impl Into<String>) -> Self {
        Self {
            credential: Some(credential.into()),
            ..self
        }
    }
}

/// The request pipeline.
///
/// [`lookup`](Self::lookup) runs admission, the credential check, request
/// normalization and the batch fan-out, in that order. Each stage can reject
/// the request before the next one does any work.
pub struct Gateway<O, S> {
    limiter: Arc<RateLimiter>,
    credentials: Arc<CredentialGate<S>>,
    resolver: BatchResolver<O>,
}

impl<O, S> Gateway<O, S>
where
    O: OriginClient,
    S: CredentialStore,
{
    /// Assemble a gateway from its components.
    pub fn new(
        limiter: Arc<RateLimiter>,
        credentials: Arc<CredentialGate<S>>,
        resolver: BatchResolver<O>,
    ) -> Self {
        Self {
            limiter,
            credentials,
            resolver,
        }
    }

    /// Assemble a gateway over a shared lookup cache.
    pub fn from_parts(
        limiter: RateLimiter,
        credentials: CredentialGate<S>,
        cache: LookupCache<O>,
    ) -> Self {
        Self::new(
            Arc::new(limiter),
            Arc::new(credentials),
            BatchResolver::new(Arc::new(cache)),
        )
    }

    /// Serve one batch lookup.
    #[instrument(skip_all, fields(identity = %request.identity, subjects = request.subjects.len()))]
    pub async fn lookup(&self, request: LookupRequest) -> Result<Vec<SubjectResult>, GatewayError> {
        if let Admission::Rejected { retry_after } = self.limiter.check(&request.identity) {
            return Err(GatewayError::RateLimited { retry_after });
        }

        let credential = request
            .credential
            .as_deref()
            .filter(|credential| !credential.is_empty())
            .ok_or(GatewayError::MissingCredential)?;
        if self.credentials.check(credential).await? == Verdict::Invalid {
            return Err(GatewayError::InvalidCredential);
        }

        let batch = SubjectBatch::parse(request.subjects)?;
        debug!(subjects = batch.len(), "Request admitted");
        Ok(self.resolver.resolve_many(batch.subjects()).await)
    }

    /// Clear every rate limiter bucket.
    pub fn reset_rate_limits(&self) {
        self.limiter.reset();
    }

    /// Wait for background cache writes to finish.
    ///
    /// Returns `false` if some were still running after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let cache = self.resolver.cache().offload().wait_all_timeout(timeout).await;
        let credentials = self.credentials.offload().wait_all_timeout(timeout).await;
        cache && credentials
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The credential gate.
    pub fn credentials(&self) -> &Arc<CredentialGate<S>> {
        &self.credentials
    }

    /// The batch resolver.
    pub fn resolver(&self) -> &BatchResolver<O> {
        &self.resolver
    }

    /// The lookup cache behind the resolver.
    pub fn cache(&self) -> &Arc<LookupCache<O>> {
        self.resolver.cache()
    }
}

impl<O, S> std::fmt::Debug for Gateway<O, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("limiter", &self.limiter)
            .field("credentials", &self.credentials)
            .field("resolver", &self.resolver)
            .finish()
    }
}
