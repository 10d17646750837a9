use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use coalesce_backend::{Backend, CredentialStore};
use coalesce_core::{CacheKey, CredentialVerdict, StoreError, Verdict};
use moka::Expiry;
use moka::future::Cache;
use smol_str::{SmolStr, format_smolstr};
use tokio::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

use crate::metrics;
use crate::offload::{OffloadManager, TimeoutPolicy};
use crate::policy::CredentialPolicy;

/// Tier that produced a credential verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    /// The process-local cache.
    Local,
    /// The shared external cache.
    External,
    /// The authoritative credential store.
    Store,
}

impl VerdictSource {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expires local verdicts at their own `expires_at`, on create and on update.
#[derive(Clone, Copy, Debug)]
struct VerdictExpiry;

impl Expiry<String, CredentialVerdict> for VerdictExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CredentialVerdict,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(Self::remaining(value))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CredentialVerdict,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(Self::remaining(value))
    }
}

impl VerdictExpiry {
    fn remaining(value: &CredentialVerdict) -> Duration {
        value.expires_at().saturating_duration_since(Instant::now())
    }
}

/// Shortened form of a credential that is safe to log.
pub fn redact(token: &str) -> SmolStr {
    if token.chars().count() < 12 {
        return SmolStr::new_static("***");
    }
    let prefix: String = token.chars().take(6).collect();
    format_smolstr!("{prefix}***")
}

fn fingerprint(token: &str) -> SmolStr {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    format_smolstr!("{:016x}", hasher.finish())
}

/// Two-tier cache of credential verdicts in front of a [`CredentialStore`].
///
/// A check consults, in order, the process-local cache, the shared external
/// cache and the store. Both `valid` and `invalid` verdicts are cached, the
/// latter for a shorter time, so a caller retrying a bad credential does not
/// reach the store on every request. Store failures are returned as
/// [`StoreError`] and never cached.
///
/// Verdicts obtained from the store are written back to the external cache
/// in the background; the request never waits for that write.
pub struct CredentialGate<S> {
    local: Cache<String, CredentialVerdict>,
    external: Option<Arc<dyn Backend>>,
    store: S,
    offload: OffloadManager,
    policy: CredentialPolicy,
}

impl<S> CredentialGate<S>
where
    S: CredentialStore,
{
    /// Create a gate backed by `store` only.
    pub fn new(store: S, policy: CredentialPolicy) -> Self {
        let local = Cache::builder()
            .max_capacity(policy.local_capacity)
            .expire_after(VerdictExpiry)
            .build();
        Self {
            local,
            external: None,
            store,
            offload: OffloadManager::with_defaults(),
            policy,
        }
    }

    /// Add a shared external cache tier.
    pub fn with_external(self, backend: Arc<dyn Backend>) -> Self {
        Self {
            external: Some(backend),
            ..self
        }
    }

    /// Run back-fill writes on a shared offload manager.
    pub fn with_offload(self, offload: OffloadManager) -> Self {
        Self { offload, ..self }
    }

    /// Check `token`, returning its verdict or the store failure.
    pub async fn check(&self, token: &str) -> Result<Verdict, StoreError> {
        self.check_with_source(token)
            .await
            .map(|(verdict, _)| verdict)
    }

    /// Like [`check`](Self::check), also reporting which tier answered.
    pub async fn check_with_source(
        &self,
        token: &str,
    ) -> Result<(Verdict, VerdictSource), StoreError> {
        let span = info_span!("credential_check", credential = %redact(token));
        async move {
            if token.is_empty() {
                debug!("Empty credential");
                return Ok((Verdict::Invalid, VerdictSource::Local));
            }

            let (verdict, source) = if let Some(verdict) = self.read_local(token).await {
                (verdict, VerdictSource::Local)
            } else if let Some(verdict) = self.read_external(token).await {
                self.remember(token, verdict).await;
                (verdict, VerdictSource::External)
            } else {
                let verdict = self.read_store(token).await?;
                self.remember(token, verdict).await;
                self.back_fill(token, verdict);
                (verdict, VerdictSource::Store)
            };

            debug!(%verdict, %source, "Credential checked");
            metrics::record_verdict(verdict, source);
            Ok((verdict, source))
        }
        .instrument(span)
        .await
    }

    async fn read_local(&self, token: &str) -> Option<Verdict> {
        let cached = self.local.get(token).await?;
        if cached.is_expired(Instant::now()) {
            self.local.invalidate(token).await;
            return None;
        }
        Some(cached.status())
    }

    async fn read_external(&self, token: &str) -> Option<Verdict> {
        let backend = self.external.as_ref()?;
        let key = CacheKey::credential(token);

        match tokio::time::timeout(self.policy.external_timeout, backend.read(&key)).await {
            Ok(Ok(Some(raw))) => match raw.parse::<Verdict>() {
                Ok(verdict) => Some(verdict),
                Err(error) => {
                    warn!(backend = %backend.label(), %error, "Ignoring unreadable cached verdict");
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(error)) => {
                warn!(backend = %backend.label(), %error, "External verdict read failed");
                None
            }
            Err(_) => {
                debug!(
                    backend = %backend.label(),
                    timeout_ms = self.policy.external_timeout.as_millis(),
                    "External verdict read timed out"
                );
                None
            }
        }
    }

    async fn read_store(&self, token: &str) -> Result<Verdict, StoreError> {
        let deadline = self.policy.store_timeout;
        let record = match tokio::time::timeout(deadline, self.store.find_credential(token)).await {
            Ok(Ok(record)) => record,
            Ok(Err(error)) => {
                warn!(code = error.code(), %error, "Credential store lookup failed");
                return Err(error);
            }
            Err(_) => {
                warn!(timeout_ms = deadline.as_millis(), "Credential store lookup timed out");
                return Err(StoreError::Timeout(deadline));
            }
        };

        Ok(record
            .filter(|record| record.key == token)
            .map(|record| record.verdict())
            .unwrap_or(Verdict::Invalid))
    }

    async fn remember(&self, token: &str, verdict: Verdict) {
        let cached = CredentialVerdict::new(verdict, self.policy.ttl_for(verdict));
        self.local.insert(token.to_owned(), cached).await;
    }

    fn back_fill(&self, token: &str, verdict: Verdict) {
        let Some(backend) = self.external.clone() else {
            return;
        };
        let key = CacheKey::credential(token);
        let ttl = self.policy.ttl_for(verdict);

        // Offload keys show up in task spans: dedup on a digest of the token.
        self.offload.spawn_keyed(
            CacheKey::new(key.prefix(), fingerprint(token)),
            TimeoutPolicy::Cancel(self.policy.write_timeout),
            async move {
                if let Err(error) = backend
                    .write(&key, verdict.as_str().to_owned(), Some(ttl))
                    .await
                {
                    warn!(backend = %backend.label(), %error, "Failed to back-fill credential verdict");
                }
            },
        );
    }

    /// Drop the locally cached verdict for `token`.
    pub async fn forget(&self, token: &str) {
        self.local.invalidate(token).await;
    }

    /// Approximate number of verdicts cached locally.
    pub fn local_len(&self) -> u64 {
        self.local.entry_count()
    }

    /// The offload manager running back-fill writes.
    pub fn offload(&self) -> &OffloadManager {
        &self.offload
    }

    /// The policy this gate was built with.
    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }
}

impl<S> fmt::Debug for CredentialGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialGate")
            .field("local", &self.local.entry_count())
            .field("external", &self.external.as_ref().map(|backend| backend.label()))
            .field("policy", &self.policy)
            .finish()
    }
}
