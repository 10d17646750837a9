//! Cached subject values.

use std::time::Duration;

use tokio::time::Instant;

/// A resolved value and the instant it was observed at the origin.
///
/// Instants come from [`tokio::time`], so tests running on a paused clock can
/// age entries deterministically with `tokio::time::advance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    value: f64,
    observed_at: Instant,
}

impl CacheEntry {
    /// Creates an entry observed at `observed_at`.
    pub fn new(value: f64, observed_at: Instant) -> Self {
        Self { value, observed_at }
    }

    /// Creates an entry observed now.
    pub fn observed_now(value: f64) -> Self {
        Self::new(value, Instant::now())
    }

    /// The cached value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// When the value was fetched.
    #[inline]
    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }

    /// Time elapsed since the value was fetched.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.observed_at)
    }

    /// Whether the entry may still be served within the freshness `window`.
    pub fn is_fresh(&self, window: Duration, now: Instant) -> bool {
        self.age(now) < window
    }
}
