//! Hot path benchmarks for the drop registry.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! `DropStore::take` is a linear scan, so pickup cost grows with the
//! number of live drops; these benchmarks track that curve.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use item_drops::catalog::{BaseItem, StaticItemCatalog};
use item_drops::drops::{
    DropContents, DropId, DropRecord, DropRegistry, DropStore, Position, RegistryConfig,
    StoredItem,
};
use item_drops::persistence::InMemoryDocumentStore;
use item_drops::presentation::NullSink;
use item_drops::{SimulatedClock, Timestamp};
use std::sync::Arc;

fn record(i: usize, expiration_ms: u64) -> DropRecord {
    DropRecord {
        id: DropId::new(format!("{:024x}", i)),
        contents: DropContents {
            item: StoredItem::new("burger", 1),
            name: "Burger".to_string(),
            model: "prop_cs_burger_01".to_string(),
            expiration: Timestamp::from_millis(expiration_ms),
        },
        position: Position::new(i as f32, 0.0, 0.0),
    }
}

fn filled_store(count: usize) -> DropStore {
    let store = DropStore::new();
    store.load((0..count).map(|i| record(i, u64::MAX)).collect());
    store
}

/// Benchmark DropStore::insert
fn bench_store_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_insert");
    group.throughput(Throughput::Elements(1));

    for size in [100, 10_000] {
        group.bench_function(format!("live_{}", size), |b| {
            b.iter_batched(
                || (filled_store(size), record(size, u64::MAX)),
                |(store, record)| black_box(store.insert(record)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark DropStore::take for the oldest (worst case) and newest drop
fn bench_store_take(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_take");
    group.throughput(Throughput::Elements(1));
    let now = Timestamp::from_millis(0);

    for size in [100, 1_000, 10_000] {
        group.bench_function(format!("oldest_of_{}", size), |b| {
            let target = DropId::new(format!("{:024x}", 0));
            b.iter_batched(
                || filled_store(size),
                |store| black_box(store.take(&target, now)),
                BatchSize::LargeInput,
            )
        });

        group.bench_function(format!("newest_of_{}", size), |b| {
            let target = DropId::new(format!("{:024x}", size - 1));
            b.iter_batched(
                || filled_store(size),
                |store| black_box(store.take(&target, now)),
                BatchSize::LargeInput,
            )
        });
    }

    group.bench_function("miss_sweeps_1000_expired", |b| {
        let target = DropId::new("missing");
        b.iter_batched(
            || {
                let store = DropStore::new();
                store.load((0..1_000).map(|i| record(i, 10)).collect());
                store
            },
            |store| black_box(store.take(&target, Timestamp::from_millis(20))),
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

/// Benchmark a full add + sub through the registry and in-memory store
fn bench_registry_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let catalog = Arc::new(
        StaticItemCatalog::new().with_item(BaseItem::new("burger", "Burger", "prop_cs_burger_01")),
    );
    let registry = DropRegistry::new(
        InMemoryDocumentStore::new(),
        catalog,
        Arc::new(NullSink),
        SimulatedClock::new(0),
        RegistryConfig::default(),
    );
    runtime.block_on(registry.initialize()).expect("initialize");
    let item = StoredItem::new("burger", 1);

    let mut group = c.benchmark_group("registry");
    group.throughput(Throughput::Elements(1));
    group.bench_function("add_then_sub", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let id = registry
                    .add(black_box(&item), Position::default())
                    .await
                    .expect("add")
                    .expect("known item");
                black_box(registry.sub(id.as_str()).await.expect("sub"))
            })
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_store_insert,
    bench_store_take,
    bench_registry_round_trip
);
criterion_main!(benches);
