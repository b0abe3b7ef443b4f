//! Benchmarks for key assignment, ingestion and queries
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use logstore::config::{IndexConfig, IngestConfig, QueryConfig};
use logstore::storage::*;
use logstore::{Ingester, QueryEngine, TimeIndex};
use std::sync::Arc;
use tempfile::tempdir;

fn create_test_entries(count: usize) -> Vec<LogEntry> {
    (0..count)
        .map(|i| LogEntry::new(((i * 7919) % count) as i64 * 1000, format!("request {} ok", i)))
        .collect()
}

struct Pipeline {
    index: Arc<TimeIndex>,
    ingester: Ingester,
    engine: QueryEngine,
}

fn pipeline(store: Arc<dyn BlobStore>, cache_enabled: bool) -> Pipeline {
    let index = Arc::new(TimeIndex::new(
        Arc::clone(&store),
        IndexConfig {
            cache_enabled,
            single_writer: true,
            ..IndexConfig::default()
        },
    ));
    Pipeline {
        ingester: Ingester::new(Arc::clone(&store), Arc::clone(&index), IngestConfig::default()),
        engine: QueryEngine::new(Arc::clone(&index), store, QueryConfig::default()),
        index,
    }
}

fn bench_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("keys");
    let batch = BatchId::generate();

    for size in [100, 1000, 10000] {
        let entries = create_test_entries(size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("assign_{}", size), |b| {
            b.iter(|| assign_keys(black_box(&batch), black_box(&entries)).unwrap())
        });
    }

    group.bench_function("parse", |b| {
        let key = StorageKey::new(1_700_000_000_000, &batch, 42).unwrap();
        b.iter(|| StorageKey::parse(black_box(key.as_str())).unwrap())
    });

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("ingest");

    group.bench_function("memory_batch_1000", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let p = pipeline(Arc::new(MemoryBlobStore::new()), true);
                let entries = create_test_entries(1000);

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    p.ingester.ingest_entries(None, entries.clone()).await.unwrap();
                }

                start.elapsed()
            })
        });
    });

    group.bench_function("local_batch_100", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let store = Arc::new(ObjectBlobStore::local(dir.path()).unwrap());
                let p = pipeline(store, true);
                let entries = create_test_entries(100);

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    p.ingester.ingest_entries(None, entries.clone()).await.unwrap();
                }

                start.elapsed()
            })
        });
    });

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("query");

    for cache_enabled in [false, true] {
        let name = if cache_enabled { "cached" } else { "listing" };

        group.bench_function(format!("range_100_of_10000_{}", name), |b| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let p = pipeline(Arc::new(MemoryBlobStore::new()), cache_enabled);

                    // Setup: 10k entries one second apart
                    let entries: Vec<LogEntry> = (0..10_000)
                        .map(|i| LogEntry::new(i * 1000, format!("line {}", i)))
                        .collect();
                    p.ingester.ingest_entries(None, entries).await.unwrap();
                    p.index.refresh().await.unwrap();

                    let range = QueryRange::new(5_000_000, 5_099_000).text("line");

                    let start = std::time::Instant::now();

                    for _ in 0..iters {
                        let _ = p.engine.query(black_box(&range)).await.unwrap();
                    }

                    start.elapsed()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_keys, bench_ingest, bench_query);
criterion_main!(benches);
