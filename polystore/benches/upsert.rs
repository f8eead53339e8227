//! Upsert Benchmarks
//!
//! Benchmarks for the write pipeline at various batch sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polystore::dst::DeterministicRng;
use polystore::storage::{
    build_sql_write, PrimaryKeyMap, Record, SimStorage, Storage, Table,
};

use std::time::Duration;

// =============================================================================
// Setup Helpers
// =============================================================================

/// Create test records for benchmarking.
fn create_test_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new()
                .with_field("test_string", format!("key{i}"))
                .with_field("id", format!("{i}"))
                .with_field("payload", format!("sample payload for record number {i}"))
        })
        .collect()
}

fn create_storage() -> SimStorage {
    let storage = SimStorage::relational(DeterministicRng::new(42));
    storage.create_table("pktests1", vec!["test_string".to_string()]);
    storage
}

// =============================================================================
// SimStorage Benchmarks
// =============================================================================

fn bench_upsert_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("sim_storage/upsert_batch");
    group.measurement_time(Duration::from_secs(10));

    for size in [10, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let storage = create_storage();
            let records = create_test_records(size);

            b.to_async(&rt).iter(|| async {
                black_box(
                    storage
                        .upsert(
                            Table::new("pktests1"),
                            records.clone(),
                            PrimaryKeyMap::new(),
                        )
                        .await
                        .unwrap(),
                );
            });
        });
    }
    group.finish();
}

fn bench_upsert_existing_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("sim_storage/upsert_replace");
    group.measurement_time(Duration::from_secs(10));

    for size in [100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let storage = create_storage();
            let records = create_test_records(size);

            // Pre-populate so every write matches an existing key.
            rt.block_on(async {
                storage
                    .upsert(
                        Table::new("pktests1"),
                        records.clone(),
                        PrimaryKeyMap::new(),
                    )
                    .await
                    .unwrap();
            });

            let record = records[size / 2].clone();

            b.to_async(&rt).iter(|| async {
                black_box(
                    storage
                        .upsert(
                            Table::new("pktests1"),
                            vec![record.clone()],
                            PrimaryKeyMap::new(),
                        )
                        .await
                        .unwrap(),
                );
            });
        });
    }
    group.finish();
}

// =============================================================================
// Write Builder Benchmarks
// =============================================================================

fn bench_build_sql_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert/build_sql_write");

    let table = Table::new("pktests1");
    let record = create_test_records(1).remove(0);
    let key_columns = vec!["test_string".to_string()];

    group.bench_function("single_record", |b| {
        b.iter(|| {
            black_box(build_sql_write(&table, &record, &key_columns).unwrap());
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_upsert_batch,
    bench_upsert_existing_rows,
    bench_build_sql_write
);
criterion_main!(benches);
