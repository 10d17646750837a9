use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coalesce_core::{OriginClient, OriginError, Subject};
use dashmap::DashMap;

/// Failure a [`MockOrigin`] reports for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Malformed,
    Remote,
}

#[derive(Debug, Default)]
pub struct OriginCounters {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// Decrements the in-flight count even when the call is cancelled by a
/// timeout.
struct InFlight<'a>(&'a OriginCounters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a OriginCounters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scriptable origin.
///
/// Unless configured otherwise, every subject resolves to `default_value`
/// after `latency`.
#[derive(Clone, Debug)]
pub struct MockOrigin {
    values: Arc<DashMap<Subject, f64>>,
    failures: Arc<DashMap<Subject, Failure>>,
    delays: Arc<DashMap<Subject, Duration>>,
    per_subject: Arc<DashMap<Subject, usize>>,
    latency_ms: Arc<AtomicU64>,
    default_value: f64,
    pub counters: Arc<OriginCounters>,
}

impl Default for MockOrigin {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOrigin {
    pub fn new() -> Self {
        Self {
            values: Arc::new(DashMap::new()),
            failures: Arc::new(DashMap::new()),
            delays: Arc::new(DashMap::new()),
            per_subject: Arc::new(DashMap::new()),
            latency_ms: Arc::new(AtomicU64::new(0)),
            default_value: 1.0,
            counters: Arc::new(OriginCounters::default()),
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Resolve `subject` to `value`.
    pub fn set_value(&self, subject: &str, value: f64) {
        self.values.insert(Subject::new(subject), value);
    }

    /// Make every call for `subject` fail.
    pub fn fail(&self, subject: &str, failure: Failure) {
        self.failures.insert(Subject::new(subject), failure);
    }

    pub fn recover(&self, subject: &str) {
        self.failures.remove(&Subject::new(subject));
    }

    /// Override the latency of `subject` alone.
    pub fn delay(&self, subject: &str, latency: Duration) {
        self.delays.insert(Subject::new(subject), latency);
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, subject: &str) -> usize {
        self.per_subject
            .get(&Subject::new(subject))
            .map(|calls| *calls)
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.per_subject.clear();
        self.counters.calls.store(0, Ordering::SeqCst);
        self.counters.max_in_flight.store(0, Ordering::SeqCst);
    }

    fn latency_for(&self, subject: &Subject) -> Duration {
        self.delays
            .get(subject)
            .map(|latency| *latency)
            .unwrap_or_else(|| Duration::from_millis(self.latency_ms.load(Ordering::SeqCst)))
    }
}

#[async_trait]
impl OriginClient for MockOrigin {
    async fn fetch(&self, subject: &Subject, _deadline: Duration) -> Result<f64, OriginError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_subject.entry(subject.clone()).or_insert(0) += 1;
        let _in_flight = InFlight::enter(&self.counters);

        let latency = self.latency_for(subject);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failures.get(subject).map(|failure| *failure);
        match failure {
            Some(Failure::Malformed) => Err(OriginError::MalformedSubject(subject.clone())),
            Some(Failure::Remote) => Err(OriginError::Remote {
                subject: subject.clone(),
                reason: "mock origin failure".into(),
            }),
            None => Ok(self
                .values
                .get(subject)
                .map(|value| *value)
                .unwrap_or(self.default_value)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
