//! Single-flight and freshness behaviour of the lookup cache.

use std::sync::Arc;
use std::time::Duration;

use coalesce::{CacheKey, LookupCache, LookupPolicy, LookupStatus, OriginError, Subject};
use coalesce_test::mock_backend::MockBackend;
use coalesce_test::mock_origin::{Failure, MockOrigin};
use futures::future::join_all;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

fn cache(origin: &MockOrigin) -> Arc<LookupCache<MockOrigin>> {
    Arc::new(LookupCache::new(origin.clone(), LookupPolicy::default()))
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_collapse_into_one_origin_call() {
    coalesce_test::tracing::init();
    let origin = MockOrigin::new().with_latency(Duration::from_millis(200));
    origin.set_value("alice", 4.2);
    let cache = cache(&origin);

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.resolve_with_status(&Subject::new("alice")).await })
        })
        .collect();

    let mut misses = 0;
    for handle in handles {
        let (value, status) = handle.await.unwrap().unwrap();
        assert_eq!(value, 4.2);
        if status == LookupStatus::Miss {
            misses += 1;
        }
    }

    assert_eq!(misses, 1);
    assert_eq!(origin.calls_for("alice"), 1);
    assert_eq!(cache.in_flight_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn single_flight_holds_across_worker_threads() {
    let origin = MockOrigin::new().with_latency(Duration::from_millis(50));
    let cache = cache(&origin);

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let subject = Subject::new(if i % 2 == 0 { "even" } else { "odd" });
            tokio::spawn(async move { cache.resolve(&subject).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(1.0));
    }

    assert_eq!(origin.calls_for("even"), 1);
    assert_eq!(origin.calls_for("odd"), 1);
    assert!(origin.max_in_flight() <= 2);
}

#[tokio::test(start_paused = true)]
async fn cached_value_is_served_without_latency() {
    let origin = MockOrigin::new().with_latency(Duration::from_millis(300));
    let cache = cache(&origin);
    let subject = Subject::new("bob");

    let start = Instant::now();
    let first = cache.resolve(&subject).await;
    let cold = start.elapsed();

    let start = Instant::now();
    let second = cache.resolve(&subject).await;
    let warm = start.elapsed();

    assert_eq!(first, second);
    assert!(cold >= Duration::from_millis(300));
    assert!(warm < cold);
    assert_eq!(origin.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_refreshed() {
    let origin = MockOrigin::new();
    origin.set_value("carol", 1.0);
    let cache = cache(&origin);
    let subject = Subject::new("carol");

    assert_eq!(cache.resolve(&subject).await, Ok(1.0));
    let first_seen = cache.entry(&subject).unwrap().observed_at();

    origin.set_value("carol", 2.0);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(cache.resolve(&subject).await, Ok(1.0));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(cache.peek(&subject), None);
    assert_eq!(cache.resolve(&subject).await, Ok(2.0));
    assert!(cache.entry(&subject).unwrap().observed_at() > first_seen);
    assert_eq!(origin.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failure_reaches_every_waiter_and_is_not_cached() {
    let origin = MockOrigin::new().with_latency(Duration::from_millis(100));
    origin.fail("dave", Failure::Remote);
    let cache = cache(&origin);
    let subject = Subject::new("dave");

    let results = join_all((0..4).map(|_| cache.resolve(&subject))).await;
    for result in &results {
        assert_eq!(result.as_ref().map_err(OriginError::code), Err("remote_failure"));
    }
    // Waiters behind the failed holder retry in turn; nothing is cached.
    assert_eq!(origin.calls_for("dave"), 4);
    assert!(cache.entry(&subject).is_none());

    origin.recover("dave");
    assert_eq!(cache.resolve(&subject).await, Ok(1.0));
}

#[tokio::test(start_paused = true)]
async fn origin_timeout_fails_fast_and_releases_the_guard() {
    let origin = MockOrigin::new().with_latency(Duration::from_secs(60));
    let policy = LookupPolicy::default().origin_timeout(Duration::from_secs(10));
    let cache = LookupCache::new(origin.clone(), policy);
    let subject = Subject::new("erin");

    let start = Instant::now();
    let result = cache.resolve(&subject).await;
    assert_eq!(
        result,
        Err(OriginError::Timeout {
            subject: subject.clone(),
            deadline: Duration::from_secs(10),
        })
    );
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(11));
    assert_eq!(cache.in_flight_len(), 0);

    origin.set_latency(Duration::ZERO);
    assert_eq!(cache.resolve(&subject).await, Ok(1.0));
}

#[tokio::test(start_paused = true)]
async fn values_are_mirrored_with_freshness_ttl() {
    let origin = MockOrigin::new();
    origin.set_value("frank", 0.5);
    let backend = MockBackend::new();
    let cache = LookupCache::new(origin, LookupPolicy::default())
        .with_mirror(Arc::new(backend.clone()));
    let subject = Subject::new("frank");

    cache.resolve(&subject).await.unwrap();
    assert!(cache.offload().wait_all_timeout(Duration::from_secs(1)).await);

    let key = CacheKey::balance(&subject);
    assert_eq!(key.to_string(), "balance:frank");
    assert_eq!(backend.get(&key).as_deref(), Some("0.5"));
    assert_eq!(backend.ttl(&key), Some(Duration::from_secs(10)));
}

#[tokio::test(start_paused = true)]
async fn mirror_failures_never_reach_the_caller() {
    let backend = MockBackend::new();
    backend.set_offline(true);
    let cache = LookupCache::new(MockOrigin::new(), LookupPolicy::default())
        .with_mirror(Arc::new(backend.clone()));

    assert_eq!(cache.resolve(&Subject::new("gina")).await, Ok(1.0));
    cache.offload().wait_all().await;
    assert_eq!(backend.write_count(), 1);
    assert_eq!(backend.cache_entry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_mirror_is_cancelled_at_its_deadline() {
    let backend = MockBackend::new();
    backend.set_latency(Duration::from_secs(30));
    let policy = LookupPolicy::default().mirror_timeout(Duration::from_secs(5));
    let cache = LookupCache::new(MockOrigin::new(), policy).with_mirror(Arc::new(backend.clone()));

    let start = Instant::now();
    assert_eq!(cache.resolve(&Subject::new("hank")).await, Ok(1.0));
    assert_eq!(start.elapsed(), Duration::ZERO);

    cache.offload().wait_all().await;
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(backend.cache_entry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_during_pending_mirror_write_is_not_mirrored_twice() {
    let origin = MockOrigin::new();
    let backend = MockBackend::new();
    backend.set_latency(Duration::from_secs(20));
    let policy = LookupPolicy::default().mirror_timeout(Duration::from_secs(60));
    let cache = LookupCache::new(origin.clone(), policy).with_mirror(Arc::new(backend.clone()));
    let subject = Subject::new("iris");

    assert_eq!(cache.resolve(&subject).await, Ok(1.0));
    origin.set_value("iris", 2.0);
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(cache.resolve(&subject).await, Ok(2.0));
    assert_eq!(origin.calls(), 2);

    cache.offload().wait_all().await;
    assert_eq!(backend.write_count(), 1);
    assert_eq!(backend.get(&CacheKey::balance(&subject)).as_deref(), Some("1"));

    origin.set_value("iris", 3.0);
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(cache.resolve(&subject).await, Ok(3.0));
    cache.offload().wait_all().await;
    assert_eq!(backend.write_count(), 2);
    assert_eq!(backend.get(&CacheKey::balance(&subject)).as_deref(), Some("3"));
}

#[tokio::test(start_paused = true)]
async fn peek_returns_only_fresh_values() {
    let origin = MockOrigin::new();
    origin.set_value("jack", 7.5);
    let cache = cache(&origin);
    let subject = Subject::new("jack");

    assert_eq!(cache.peek(&subject), None);
    cache.resolve(&subject).await.unwrap();
    assert_eq!(cache.peek(&subject), Some(7.5));

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(cache.peek(&subject), None);
    assert_eq!(origin.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn one_shot_subjects_are_swept() {
    let policy = LookupPolicy::default().sweep_every(10);
    let cache = LookupCache::new(MockOrigin::new(), policy);

    for i in 0..9 {
        cache.resolve(&Subject::new(format!("one-shot-{i}"))).await.unwrap();
    }
    assert_eq!(cache.len(), 9);

    tokio::time::advance(Duration::from_secs(11)).await;
    cache.resolve(&Subject::new("fresh")).await.unwrap();
    assert_eq!(cache.len(), 1);
}
