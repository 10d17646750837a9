//! Fan-out ordering and failure isolation.

use std::sync::Arc;
use std::time::Duration;

use coalesce::{BatchResolver, LookupCache, LookupPolicy, Subject};
use coalesce_test::mock_origin::{Failure, MockOrigin};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

fn subjects(ids: &[&str]) -> Vec<Subject> {
    ids.iter().copied().map(Subject::new).collect()
}

fn resolver(origin: &MockOrigin) -> BatchResolver<MockOrigin> {
    BatchResolver::new(Arc::new(LookupCache::new(
        origin.clone(),
        LookupPolicy::default(),
    )))
}

#[tokio::test(start_paused = true)]
async fn output_order_matches_input_not_completion() {
    let origin = MockOrigin::new();
    origin.set_value("A", 1.0);
    origin.set_value("B", 2.0);
    origin.set_value("C", 3.0);
    origin.delay("A", Duration::from_millis(300));
    origin.delay("B", Duration::from_millis(200));
    origin.delay("C", Duration::from_millis(100));

    let results = resolver(&origin)
        .resolve_many(&subjects(&["A", "B", "C"]))
        .await;

    let observed: Vec<_> = results
        .iter()
        .map(|result| (result.subject.as_str(), result.value()))
        .collect();
    assert_eq!(observed, vec![("A", 1.0), ("B", 2.0), ("C", 3.0)]);
}

#[tokio::test(start_paused = true)]
async fn failing_subject_does_not_affect_siblings() {
    let origin = MockOrigin::new();
    origin.set_value("A", 1.5);
    origin.set_value("C", 3.5);
    origin.fail("B", Failure::Remote);

    let results = resolver(&origin)
        .resolve_many(&subjects(&["A", "B", "C"]))
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].outcome, Ok(1.5));
    assert_eq!(results[1].value(), 0.0);
    assert_eq!(results[1].error().map(|error| error.code()), Some("remote_failure"));
    assert_eq!(results[2].outcome, Ok(3.5));
}

#[tokio::test(start_paused = true)]
async fn subjects_resolve_concurrently() {
    let origin = MockOrigin::new().with_latency(Duration::from_millis(500));
    let ids: Vec<String> = (0..20).map(|i| format!("subject-{i}")).collect();
    let batch: Vec<Subject> = ids.iter().map(|id| Subject::new(id.as_str())).collect();

    let start = Instant::now();
    let results = resolver(&origin).resolve_many(&batch).await;

    assert_eq!(results.len(), 20);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(origin.max_in_flight(), 20);
}

#[tokio::test(start_paused = true)]
async fn duplicate_subjects_share_one_origin_call() {
    let origin = MockOrigin::new().with_latency(Duration::from_millis(50));

    let results = resolver(&origin)
        .resolve_many(&subjects(&["dup", "other", "dup"]))
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].subject, results[2].subject);
    assert_eq!(origin.calls_for("dup"), 1);
    assert_eq!(origin.calls_for("other"), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_subject_is_reported_per_entry() {
    let origin = MockOrigin::new();
    origin.fail("not-an-address", Failure::Malformed);

    let results = resolver(&origin)
        .resolve_many(&subjects(&["ok", "not-an-address"]))
        .await;

    assert!(results[0].error().is_none());
    let error = results[1].error().unwrap();
    assert_eq!(error.code(), "malformed_subject");
    assert!(!error.is_retryable());
}
