//! Hot-path benchmarks: cache hits, admission checks and warm batches.
//!
//! Run with: cargo bench -p coalesce-test --bench lookup

use std::sync::Arc;

use coalesce::{
    BatchResolver, ClientIdentity, LookupCache, LookupPolicy, RateLimitPolicy, RateLimiter,
    Subject,
};
use coalesce_test::mock_origin::MockOrigin;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn warm_cache(runtime: &tokio::runtime::Runtime, subjects: &[Subject]) -> Arc<LookupCache<MockOrigin>> {
    // Keep entries fresh for the whole run and never sweep mid-measurement.
    let policy = LookupPolicy::default()
        .freshness(std::time::Duration::from_secs(3_600))
        .sweep_every(0);
    let cache = Arc::new(LookupCache::new(MockOrigin::new(), policy));
    runtime.block_on(async {
        for subject in subjects {
            cache.resolve(subject).await.unwrap();
        }
    });
    cache
}

fn lookup_benchmarks(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let subjects: Vec<Subject> = (0..1000)
        .map(|i| Subject::new(format!("subject-{i}")))
        .collect();
    let cache = warm_cache(&runtime, &subjects);

    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        let mut counter = 0usize;
        b.to_async(&runtime).iter(|| {
            let subject = &subjects[counter % subjects.len()];
            counter = counter.wrapping_add(1);
            let cache = Arc::clone(&cache);
            async move { cache.resolve(subject).await.unwrap() }
        });
    });
    group.finish();

    let resolver = BatchResolver::new(Arc::clone(&cache));
    let mut group = c.benchmark_group("batch_warm");
    for size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.to_async(&runtime)
                .iter(|| resolver.resolve_many(&subjects[..size]));
        });
    }
    group.finish();
}

fn admission_benchmarks(c: &mut Criterion) {
    let limiter = RateLimiter::new(RateLimitPolicy::default().capacity(u32::MAX));
    let identities: Vec<ClientIdentity> = (0..256)
        .map(|i| ClientIdentity::new(format!("10.0.{}.{}", i / 256, i % 256)))
        .collect();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("admission");
    group.throughput(Throughput::Elements(1));
    group.bench_function("check", |b| {
        let mut counter = 0usize;
        b.to_async(&runtime).iter(|| {
            let identity = &identities[counter % identities.len()];
            counter = counter.wrapping_add(1);
            let admitted = limiter.admit(identity);
            async move { admitted }
        });
    });
    group.finish();
}

criterion_group!(benches, lookup_benchmarks, admission_benchmarks);
criterion_main!(benches);
