//! Metrics declaration and recording helpers.
//!
//! Every `record_*` function has a no-op twin compiled when the `metrics`
//! feature is disabled, so call sites never carry `cfg` attributes.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

use crate::lookup::LookupStatus;
use crate::credential::VerdictSource;

#[cfg(feature = "metrics")]
lazy_static! {
    // Lookup cache metrics

    /// Track number of lookups by outcome (hit, coalesced, miss).
    pub static ref LOOKUP_COUNTER: &'static str = {
        metrics::describe_counter!(
            "coalesce_lookup_total",
            "Total number of subject lookups by cache outcome."
        );
        "coalesce_lookup_total"
    };
    /// Histogram of origin call duration.
    pub static ref ORIGIN_DURATION: &'static str = {
        metrics::describe_histogram!(
            "coalesce_origin_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of origin calls in seconds."
        );
        "coalesce_origin_duration_seconds"
    };
    /// Track number of failed origin calls by error code.
    pub static ref ORIGIN_ERRORS: &'static str = {
        metrics::describe_counter!(
            "coalesce_origin_errors_total",
            "Total number of failed origin calls."
        );
        "coalesce_origin_errors_total"
    };
    /// Track number of entries removed by the eviction sweep.
    pub static ref EVICTED_ENTRIES: &'static str = {
        metrics::describe_counter!(
            "coalesce_evicted_entries_total",
            "Total number of cache entries removed by the eviction sweep."
        );
        "coalesce_evicted_entries_total"
    };

    // Admission metrics

    /// Track number of requests rejected by the rate limiter.
    pub static ref RATE_LIMITED: &'static str = {
        metrics::describe_counter!(
            "coalesce_rate_limited_total",
            "Total number of requests rejected by the rate limiter."
        );
        "coalesce_rate_limited_total"
    };
    /// Track credential verdicts by status and the tier that produced them.
    pub static ref CREDENTIAL_VERDICTS: &'static str = {
        metrics::describe_counter!(
            "coalesce_credential_verdicts_total",
            "Total number of credential verdicts by status and source."
        );
        "coalesce_credential_verdicts_total"
    };

    // Offload manager metrics

    /// Track number of offload tasks spawned.
    pub static ref OFFLOAD_TASKS_SPAWNED: &'static str = {
        metrics::describe_counter!(
            "coalesce_offload_tasks_spawned_total",
            "Total number of offload tasks spawned."
        );
        "coalesce_offload_tasks_spawned_total"
    };
    /// Track number of offload tasks completed.
    pub static ref OFFLOAD_TASKS_COMPLETED: &'static str = {
        metrics::describe_counter!(
            "coalesce_offload_tasks_completed_total",
            "Total number of offload tasks completed."
        );
        "coalesce_offload_tasks_completed_total"
    };
    /// Track number of offload tasks that timed out.
    pub static ref OFFLOAD_TASKS_TIMEOUT: &'static str = {
        metrics::describe_counter!(
            "coalesce_offload_tasks_timeout_total",
            "Total number of offload tasks that timed out."
        );
        "coalesce_offload_tasks_timeout_total"
    };
    /// Track number of offload tasks deduplicated (skipped).
    pub static ref OFFLOAD_TASKS_DEDUPLICATED: &'static str = {
        metrics::describe_counter!(
            "coalesce_offload_tasks_deduplicated_total",
            "Total number of offload tasks deduplicated (skipped because already in flight)."
        );
        "coalesce_offload_tasks_deduplicated_total"
    };
    /// Histogram of offload task duration.
    pub static ref OFFLOAD_TASK_DURATION: &'static str = {
        metrics::describe_histogram!(
            "coalesce_offload_task_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of offload tasks in seconds."
        );
        "coalesce_offload_task_duration_seconds"
    };
}

/// Record the outcome of a single subject lookup.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_lookup(status: LookupStatus) {
    metrics::counter!(*LOOKUP_COUNTER, "status" => status.as_str()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_lookup(_status: LookupStatus) {}

/// Record an origin call and, on failure, its error code.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_origin(origin: &str, duration: Duration, error: Option<&'static str>) {
    metrics::histogram!(*ORIGIN_DURATION, "origin" => origin.to_string())
        .record(duration.as_secs_f64());
    if let Some(code) = error {
        metrics::counter!(*ORIGIN_ERRORS, "origin" => origin.to_string(), "code" => code)
            .increment(1);
    }
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_origin(_origin: &str, _duration: Duration, _error: Option<&'static str>) {}

/// Record entries removed by an eviction sweep.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_evicted(count: usize) {
    metrics::counter!(*EVICTED_ENTRIES).increment(count as u64);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_evicted(_count: usize) {}

/// Record a request rejected by the rate limiter.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_rejection() {
    metrics::counter!(*RATE_LIMITED).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_rejection() {}

/// Record a credential verdict and the tier that produced it.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_verdict(verdict: coalesce_core::Verdict, source: VerdictSource) {
    metrics::counter!(
        *CREDENTIAL_VERDICTS,
        "status" => verdict.as_str(),
        "source" => source.as_str()
    )
    .increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_verdict(_verdict: coalesce_core::Verdict, _source: VerdictSource) {}

/// Record an offload task being spawned.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_spawned(key_type: &str) {
    metrics::counter!(*OFFLOAD_TASKS_SPAWNED, "key_type" => key_type.to_string()).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_spawned(_key_type: &str) {}

/// Record an offload task skipped because the same key is in flight.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_deduplicated(key_type: &str) {
    metrics::counter!(*OFFLOAD_TASKS_DEDUPLICATED, "key_type" => key_type.to_string())
        .increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_deduplicated(_key_type: &str) {}

/// Record an offload task finishing, either normally or by timeout.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_finished(duration: Duration, key_type: &str, timed_out: bool) {
    let key_type = key_type.to_string();
    metrics::histogram!(*OFFLOAD_TASK_DURATION, "key_type" => key_type.clone())
        .record(duration.as_secs_f64());
    if timed_out {
        metrics::counter!(*OFFLOAD_TASKS_TIMEOUT, "key_type" => key_type).increment(1);
    } else {
        metrics::counter!(*OFFLOAD_TASKS_COMPLETED, "key_type" => key_type).increment(1);
    }
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_finished(_duration: Duration, _key_type: &str, _timed_out: bool) {}
