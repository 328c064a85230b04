use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use entitlekit_entitlements::{ProductIds, PurchaseEntry, compute};

fn record_with_renewals(renewals: usize) -> Vec<PurchaseEntry> {
    let start = Utc::now() - Duration::days(30 * renewals as i64);
    let mut entries: Vec<PurchaseEntry> = (0..renewals)
        .map(|i| {
            PurchaseEntry::expiring(
                ProductIds::DEFAULT_SUBSCRIPTION,
                start + Duration::days(30 * (i as i64 + 1)),
            )
        })
        .collect();
    entries.push(PurchaseEntry::permanent(ProductIds::DEFAULT_UNLOCK));
    entries
}

fn bench_compute(c: &mut Criterion) {
    let ids = ProductIds::default();
    let now = Utc::now();
    let mut group = c.benchmark_group("compute");

    for renewals in [1usize, 12, 120, 1_200] {
        let entries = record_with_renewals(renewals);
        group.bench_with_input(BenchmarkId::from_parameter(renewals), &entries, |b, entries| {
            b.iter(|| compute(black_box(entries), black_box(&ids), black_box(now)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute);
criterion_main!(benches);
