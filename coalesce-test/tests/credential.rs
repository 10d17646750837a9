//! Credential verdict caching across the local, external and store tiers.

use std::sync::Arc;
use std::time::Duration;

use coalesce::{CacheKey, CredentialGate, CredentialPolicy, StoreError, Verdict, VerdictSource};
use coalesce_test::mock_backend::MockBackend;
use coalesce_test::mock_store::MockStore;
use pretty_assertions::assert_eq;

const KEY: &str = "6a1f0c2e8b3d4f5a9c7e0d1b2a3c4d5e";

fn gate(store: &MockStore, backend: &MockBackend) -> CredentialGate<MockStore> {
    CredentialGate::new(store.clone(), CredentialPolicy::default())
        .with_external(Arc::new(backend.clone()))
}

#[tokio::test(start_paused = true)]
async fn valid_credential_is_served_locally_afterwards() {
    let store = MockStore::with_active([KEY]);
    let backend = MockBackend::new();
    let gate = gate(&store, &backend);

    assert_eq!(
        gate.check_with_source(KEY).await,
        Ok((Verdict::Valid, VerdictSource::Store))
    );
    tokio::time::advance(Duration::from_secs(14 * 60)).await;
    assert_eq!(
        gate.check_with_source(KEY).await,
        Ok((Verdict::Valid, VerdictSource::Local))
    );
    assert_eq!(store.calls(), 1);
    assert_eq!(backend.read_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_credential_is_negatively_cached() {
    let store = MockStore::new();
    let backend = MockBackend::new();
    let gate = gate(&store, &backend);

    assert_eq!(gate.check("unknown").await, Ok(Verdict::Invalid));
    gate.offload().wait_all().await;
    tokio::time::advance(Duration::from_secs(4 * 60)).await;
    assert_eq!(
        gate.check_with_source("unknown").await,
        Ok((Verdict::Invalid, VerdictSource::Local))
    );
    assert_eq!(store.calls(), 1);

    // Past the invalid TTL the local verdict is gone; the shared tier is
    // not, since the mock does not expire entries.
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(
        gate.check_with_source("unknown").await,
        Ok((Verdict::Invalid, VerdictSource::External))
    );
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn inactive_record_is_invalid() {
    let store = MockStore::with_active([KEY]);
    store.deactivate(KEY);
    let gate = CredentialGate::new(store.clone(), CredentialPolicy::default());

    assert_eq!(gate.check(KEY).await, Ok(Verdict::Invalid));
}

#[tokio::test(start_paused = true)]
async fn verdicts_are_back_filled_with_asymmetric_ttls() {
    let store = MockStore::with_active([KEY]);
    let backend = MockBackend::new();
    let gate = gate(&store, &backend);

    gate.check(KEY).await.unwrap();
    gate.check("unknown").await.unwrap();
    assert!(gate.offload().wait_all_timeout(Duration::from_secs(1)).await);

    let valid = CacheKey::credential(KEY);
    let invalid = CacheKey::credential("unknown");
    assert_eq!(valid.to_string(), format!("api_key:{KEY}"));
    assert_eq!(backend.get(&valid).as_deref(), Some("valid"));
    assert_eq!(backend.ttl(&valid), Some(Duration::from_secs(15 * 60)));
    assert_eq!(backend.get(&invalid).as_deref(), Some("invalid"));
    assert_eq!(backend.ttl(&invalid), Some(Duration::from_secs(5 * 60)));
}

#[tokio::test(start_paused = true)]
async fn external_verdict_skips_the_store() {
    let store = MockStore::new();
    let backend = MockBackend::new();
    backend.insert(CacheKey::credential(KEY), "valid");
    let gate = gate(&store, &backend);

    assert_eq!(
        gate.check_with_source(KEY).await,
        Ok((Verdict::Valid, VerdictSource::External))
    );
    assert_eq!(
        gate.check_with_source(KEY).await,
        Ok((Verdict::Valid, VerdictSource::Local))
    );
    assert_eq!(store.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn store_fault_is_distinct_from_invalid_and_not_cached() {
    let store = MockStore::with_active([KEY]);
    store.set_faulty(true);
    let backend = MockBackend::new();
    let gate = gate(&store, &backend);

    let error = gate.check(KEY).await.unwrap_err();
    assert!(matches!(error, StoreError::Unavailable(_)));
    assert_eq!(error.code(), "store_unavailable");

    store.set_faulty(false);
    assert_eq!(gate.check(KEY).await, Ok(Verdict::Valid));
    assert_eq!(store.calls(), 2);

    gate.offload().wait_all().await;
    assert_eq!(backend.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out() {
    let store = MockStore::with_active([KEY]);
    store.set_latency(Duration::from_secs(5));
    let gate = CredentialGate::new(store.clone(), CredentialPolicy::default());

    assert_eq!(
        gate.check(KEY).await,
        Err(StoreError::Timeout(Duration::from_secs(1)))
    );
}

#[tokio::test(start_paused = true)]
async fn unreachable_or_slow_external_cache_falls_through_to_store() {
    let store = MockStore::with_active([KEY]);
    let backend = MockBackend::new();
    backend.set_offline(true);
    let offline = gate(&store, &backend);
    assert_eq!(
        offline.check_with_source(KEY).await,
        Ok((Verdict::Valid, VerdictSource::Store))
    );

    let slow_backend = MockBackend::new();
    slow_backend.insert(CacheKey::credential(KEY), "valid");
    slow_backend.set_latency(Duration::from_secs(1));
    let slow = gate(&store, &slow_backend);
    assert_eq!(
        slow.check_with_source(KEY).await,
        Ok((Verdict::Valid, VerdictSource::Store))
    );
    assert_eq!(store.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn garbage_in_external_cache_is_ignored() {
    let store = MockStore::new();
    let backend = MockBackend::new();
    backend.insert(CacheKey::credential(KEY), "maybe");
    let gate = gate(&store, &backend);

    assert_eq!(
        gate.check_with_source(KEY).await,
        Ok((Verdict::Invalid, VerdictSource::Store))
    );
}

#[tokio::test(start_paused = true)]
async fn back_fill_failure_never_fails_the_check() {
    let store = MockStore::with_active([KEY]);
    let backend = MockBackend::new();
    let gate = gate(&store, &backend);
    backend.set_latency(Duration::from_secs(10));

    assert_eq!(gate.check(KEY).await, Ok(Verdict::Valid));
    gate.offload().wait_all().await;
    assert_eq!(backend.cache_entry_count(), 0);
}
