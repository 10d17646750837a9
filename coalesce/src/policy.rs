use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Behaviour of the [`LookupCache`](crate::LookupCache).
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct LookupPolicy {
    /// Maximum age at which a cached value is served without re-fetching
    /// (e.g., "10s", "500ms").
    #[serde(with = "humantime_serde")]
    pub freshness: Duration,
    /// Deadline for a single origin call.
    #[serde(with = "humantime_serde")]
    pub origin_timeout: Duration,
    /// Deadline for mirroring a resolved value to the external cache.
    #[serde(with = "humantime_serde")]
    pub mirror_timeout: Duration,
    /// Run the eviction sweep every N resolve calls. Zero disables it.
    pub sweep_every: u64,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(10),
            origin_timeout: Duration::from_secs(10),
            mirror_timeout: Duration::from_secs(5),
            sweep_every: 256,
        }
    }
}

impl LookupPolicy {
    /// Set the freshness window.
    pub fn freshness(self, freshness: Duration) -> Self {
        Self { freshness, ..self }
    }

    /// Set the origin call deadline.
    pub fn origin_timeout(self, origin_timeout: Duration) -> Self {
        Self {
            origin_timeout,
            ..self
        }
    }

    /// Set the mirror write deadline.
    pub fn mirror_timeout(self, mirror_timeout: Duration) -> Self {
        Self {
            mirror_timeout,
            ..self
        }
    }

    /// Set the eviction sweep period, in resolve calls.
    pub fn sweep_every(self, sweep_every: u64) -> Self {
        Self {
            sweep_every,
            ..self
        }
    }
}

/// Token bucket parameters of the [`RateLimiter`](crate::RateLimiter).
///
/// The default admits bursts of 10 and sustains 10 requests per minute.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Bucket size: the largest burst a fresh identity may send.
    pub capacity: u32,
    /// Tokens added back per `refill_interval`.
    pub refill_tokens: u32,
    /// Interval over which `refill_tokens` are restored (e.g., "1m").
    #[serde(with = "humantime_serde")]
    pub refill_interval: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_tokens: 10,
            refill_interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitPolicy {
    /// Set the bucket capacity.
    pub fn capacity(self, capacity: u32) -> Self {
        Self { capacity, ..self }
    }

    /// Set the refill as `tokens` per `interval`.
    pub fn refill(self, tokens: u32, interval: Duration) -> Self {
        Self {
            refill_tokens: tokens,
            refill_interval: interval,
            ..self
        }
    }

    /// Sustained refill rate in tokens per second.
    ///
    /// A zero interval yields zero: buckets never refill.
    pub fn refill_per_second(&self) -> f64 {
        let secs = self.refill_interval.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.refill_tokens) / secs
        } else {
            0.0
        }
    }
}

/// Behaviour of the [`CredentialGate`](crate::CredentialGate).
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CredentialPolicy {
    /// How long a `valid` verdict is trusted.
    #[serde(with = "humantime_serde")]
    pub valid_ttl: Duration,
    /// How long an `invalid` verdict is trusted. Shorter than `valid_ttl`.
    #[serde(with = "humantime_serde")]
    pub invalid_ttl: Duration,
    /// Deadline for reading the shared external cache.
    #[serde(with = "humantime_serde")]
    pub external_timeout: Duration,
    /// Deadline for the authoritative store lookup.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// Deadline for back-filling the external cache.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Maximum number of verdicts held in process memory.
    pub local_capacity: u64,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            valid_ttl: Duration::from_secs(15 * 60),
            invalid_ttl: Duration::from_secs(5 * 60),
            external_timeout: Duration::from_millis(100),
            store_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_millis(200),
            local_capacity: 10_000,
        }
    }
}

impl CredentialPolicy {
    /// Set the TTLs of valid and invalid verdicts.
    pub fn ttls(self, valid_ttl: Duration, invalid_ttl: Duration) -> Self {
        Self {
            valid_ttl,
            invalid_ttl,
            ..self
        }
    }

    /// Set the external cache read deadline.
    pub fn external_timeout(self, external_timeout: Duration) -> Self {
        Self {
            external_timeout,
            ..self
        }
    }

    /// Set the durable store deadline.
    pub fn store_timeout(self, store_timeout: Duration) -> Self {
        Self {
            store_timeout,
            ..self
        }
    }

    /// Set the external cache back-fill deadline.
    pub fn write_timeout(self, write_timeout: Duration) -> Self {
        Self {
            write_timeout,
            ..self
        }
    }

    /// TTL applied to a verdict of the given kind.
    pub fn ttl_for(&self, verdict: coalesce_core::Verdict) -> Duration {
        match verdict {
            coalesce_core::Verdict::Valid => self.valid_ttl,
            coalesce_core::Verdict::Invalid => self.invalid_ttl,
        }
    }
}
