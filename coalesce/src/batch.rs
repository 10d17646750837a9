use std::fmt;
use std::sync::Arc;

use coalesce_core::{OriginClient, OriginError, Subject};
use futures::future::join_all;
use tracing::debug;

use crate::lookup::LookupCache;

/// Result of resolving one subject of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectResult {
    /// The subject as requested.
    pub subject: Subject,
    /// Resolved value or the failure for this subject alone.
    pub outcome: Result<f64, OriginError>,
}

impl SubjectResult {
    /// The resolved value, or zero if the subject failed.
    pub fn value(&self) -> f64 {
        self.outcome.as_ref().copied().unwrap_or(0.0)
    }

    /// The failure for this subject, if any.
    pub fn error(&self) -> Option<&OriginError> {
        self.outcome.as_ref().err()
    }
}

/// Concurrent fan-out over a [`LookupCache`].
///
/// One lookup runs per subject and all of them are awaited before
/// returning. Results come back in input order with exactly one entry per
/// input; a failing subject never affects its siblings.
pub struct BatchResolver<O> {
    cache: Arc<LookupCache<O>>,
}

impl<O> fmt::Debug for BatchResolver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchResolver")
            .field("cache", &self.cache)
            .finish()
    }
}

impl<O> Clone for BatchResolver<O> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<O> BatchResolver<O>
where
    O: OriginClient,
{
    /// Create a resolver over a shared cache.
    pub fn new(cache: Arc<LookupCache<O>>) -> Self {
        Self { cache }
    }

    /// Resolve every subject concurrently, preserving input order.
    pub async fn resolve_many(&self, subjects: &[Subject]) -> Vec<SubjectResult> {
        let lookups = subjects.iter().map(|subject| async move {
            SubjectResult {
                subject: subject.clone(),
                outcome: self.cache.resolve(subject).await,
            }
        });

        let results = join_all(lookups).await;
        debug!(
            subjects = results.len(),
            failed = results.iter().filter(|result| result.outcome.is_err()).count(),
            "Resolved batch"
        );
        results
    }

    /// The cache lookups go through.
    pub fn cache(&self) -> &Arc<LookupCache<O>> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::LookupPolicy;

    struct Delayed;

    #[async_trait]
    impl OriginClient for Delayed {
        async fn fetch(&self, subject: &Subject, _deadline: Duration) -> Result<f64, OriginError> {
            match subject.as_str() {
                "bad" => Err(OriginError::MalformedSubject(subject.clone())),
                id => {
                    let delay = id.len() as u64;
                    tokio::time::sleep(Duration::from_millis(100 / delay)).await;
                    Ok(delay as f64)
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_input_order_and_isolate_failures() {
        let cache = Arc::new(LookupCache::new(Delayed, LookupPolicy::default()));
        let resolver = BatchResolver::new(cache);
        let subjects = [Subject::new("a"), Subject::new("bad"), Subject::new("cccc")];

        let results = resolver.resolve_many(&subjects).await;

        let order: Vec<_> = results.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(order, ["a", "bad", "cccc"]);
        assert_eq!(results[0].value(), 1.0);
        assert_eq!(results[1].value(), 0.0);
        assert_eq!(results[1].error().map(OriginError::code), Some("malformed_subject"));
        assert_eq!(results[2].value(), 4.0);
    }

    #[tokio::test]
    async fn empty_batch_resolves_to_nothing() {
        let cache = Arc::new(LookupCache::new(Delayed, LookupPolicy::default()));
        assert!(BatchResolver::new(cache).resolve_many(&[]).await.is_empty());
    }
}
