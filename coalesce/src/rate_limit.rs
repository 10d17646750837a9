use std::time::Duration;

use coalesce_core::ClientIdentity;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::metrics;
use crate::policy::RateLimitPolicy;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed.
    Admitted {
        /// Whole tokens left in the bucket after this request.
        remaining: u32,
    },
    /// The bucket is empty.
    Rejected {
        /// Time until the next token is available. `Duration::MAX` when the
        /// bucket never refills.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns `true` if the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    /// Time to wait before retrying, if rejected.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Admitted { .. } => None,
            Self::Rejected { retry_after } => Some(*retry_after),
        }
    }
}

/// Token bucket state for one client identity.
///
/// Tokens are refilled lazily from the elapsed time whenever the bucket is
/// consulted. The token count always stays within `[0, capacity]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBucket {
    tokens: f64,
    capacity: u32,
    refill_per_second: f64,
    last_refill: Instant,
}

impl RateBucket {
    /// A bucket holding `capacity` tokens as of `now`.
    pub fn full(capacity: u32, refill_per_second: f64, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            capacity,
            refill_per_second: refill_per_second.max(0.0),
            last_refill: now,
        }
    }

    /// Add the tokens accrued since the last refill, capped at capacity.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(f64::from(self.capacity));
        self.last_refill = now;
    }

    /// Refill, then take one token if available.
    pub fn try_take(&mut self, now: Instant) -> Admission {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Admission::Admitted {
                remaining: self.tokens.floor() as u32,
            }
        } else {
            Admission::Rejected {
                retry_after: self.time_to_next_token(),
            }
        }
    }

    fn time_to_next_token(&self) -> Duration {
        if self.capacity == 0 || self.refill_per_second <= 0.0 {
            return Duration::MAX;
        }
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::try_from_secs_f64(missing / self.refill_per_second).unwrap_or(Duration::MAX)
    }

    /// Tokens currently in the bucket, as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Per-identity token bucket rate limiter.
///
/// Buckets are created on first sight of an identity and live until
/// [`reset`](Self::reset). Identities never share state, and checks for
/// different identities only contend when they land on the same map shard.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<ClientIdentity, RateBucket>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    /// Create a limiter handing out buckets shaped by `policy`.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            buckets: DashMap::new(),
            policy,
        }
    }

    /// Consume one token for `identity`, reporting the outcome.
    pub fn check(&self, identity: &ClientIdentity) -> Admission {
        let now = Instant::now();
        let admission = self
            .buckets
            .entry(identity.clone())
            .or_insert_with(|| {
                RateBucket::full(self.policy.capacity, self.policy.refill_per_second(), now)
            })
            .try_take(now);

        if let Admission::Rejected { retry_after } = admission {
            debug!(%identity, ?retry_after, "Request rejected by rate limiter");
            metrics::record_rejection();
        }
        admission
    }

    /// Consume one token for `identity`. Returns `false` if none was left.
    pub fn admit(&self, identity: &ClientIdentity) -> bool {
        self.check(identity).is_admitted()
    }

    /// Forget every bucket, restoring full quotas.
    pub fn reset(&self) {
        let cleared = self.buckets.len();
        self.buckets.clear();
        info!(cleared, "Rate limiter state reset");
    }

    /// Snapshot of the bucket for `identity`, if one exists.
    pub fn bucket(&self, identity: &ClientIdentity) -> Option<RateBucket> {
        self.buckets.get(identity).map(|bucket| *bucket)
    }

    /// Number of identities with a bucket.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no identity has been seen since the last reset.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The policy buckets are created with.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_then_refill() {
        let limiter = RateLimiter::default();
        let client = ClientIdentity::from("X");

        let admitted = (0..11).filter(|_| limiter.admit(&client)).count();
        assert_eq!(admitted, 10);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.admit(&client));
        assert!(!limiter.admit(&client));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_reports_time_to_next_token() {
        let limiter = RateLimiter::new(RateLimitPolicy::default().capacity(1));
        let client = ClientIdentity::from("Y");

        assert_eq!(limiter.check(&client), Admission::Admitted { remaining: 0 });
        let retry_after = limiter.check(&client).retry_after().unwrap();
        assert!(retry_after > Duration::from_millis(5_900));
        assert!(retry_after <= Duration::from_millis(6_001));
    }

    #[tokio::test(start_paused = true)]
    async fn identities_are_independent() {
        let limiter = RateLimiter::new(RateLimitPolicy::default().capacity(2));
        let a = ClientIdentity::from("a");
        let b = ClientIdentity::from("b");

        assert!(limiter.admit(&a));
        assert!(limiter.admit(&a));
        assert!(!limiter.admit(&a));
        assert!(limiter.admit(&b));
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_never_exceed_capacity() {
        let limiter = RateLimiter::default();
        let client = ClientIdentity::from("idle");
        assert!(limiter.admit(&client));

        tokio::time::advance(Duration::from_secs(3_600)).await;
        assert!(limiter.admit(&client));
        let bucket = limiter.bucket(&client).unwrap();
        assert_eq!(bucket.tokens(), 9.0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_never_refills() {
        let policy = RateLimitPolicy::default()
            .capacity(1)
            .refill(0, Duration::from_secs(60));
        let limiter = RateLimiter::new(policy);
        let client = ClientIdentity::from("z");

        assert!(limiter.admit(&client));
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(
            limiter.check(&client),
            Admission::Rejected {
                retry_after: Duration::MAX
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_full_quota() {
        let limiter = RateLimiter::new(RateLimitPolicy::default().capacity(1));
        let client = ClientIdentity::from("r");

        assert!(limiter.admit(&client));
        assert!(!limiter.admit(&client));
        limiter.reset();
        assert!(limiter.is_empty());
        assert!(limiter.admit(&client));
    }
}
