//! Criterion benchmarks for the aggregation read path: interval splitting,
//! chunk merging and a full aggregated read against the in-memory store.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use tskv::kv::{EntityType, TenantId};
use tskv::query::{AggregationChunk, AggregationResult, CalendarUnit, split_intervals};
use tskv::{
    Aggregation, DataPoint, EntityId, InMemoryDriver, PartitionGranularity, ReadQuery, StorageConfig,
    TimeseriesDao,
};

const HOUR: i64 = 3_600_000;

fn chunks(n: usize) -> Vec<AggregationChunk> {
    (0..n)
        .map(|i| AggregationChunk {
            long_count: 10,
            long_value: Some(i as i64 * 7),
            double_count: 5,
            double_value: Some(i as f64 * 0.25),
            ..Default::default()
        })
        .collect()
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_intervals");
    let fixed = ReadQuery::aggregated("temp", 0, 700 * HOUR, HOUR, Aggregation::Avg);
    group.bench_function("fixed_700", |b| {
        b.iter(|| split_intervals(black_box(&fixed), 1000).unwrap())
    });
    let calendar = ReadQuery::aggregated("temp", 0, 700 * 24 * HOUR, 0, Aggregation::Avg)
        .with_calendar(CalendarUnit::Day, Some("Europe/Berlin"));
    group.bench_function("calendar_days_700", |b| {
        b.iter(|| split_intervals(black_box(&calendar), 1000).unwrap())
    });
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_chunks");
    for n in [12usize, 120, 1200] {
        let input = chunks(n);
        group.throughput(Throughput::Elements(n as u64));
        for aggregation in [Aggregation::Min, Aggregation::Avg] {
            group.bench_with_input(BenchmarkId::new(aggregation.to_string(), n), &input, |b, input| {
                b.iter(|| {
                    let mut result = AggregationResult::new(aggregation);
                    for chunk in input {
                        result.merge(chunk).unwrap();
                    }
                    result.finalize("temp", 0)
                })
            });
        }
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let config = StorageConfig {
        partition_granularity: PartitionGranularity::Hour,
        ..Default::default()
    };
    let dao = TimeseriesDao::new(Arc::new(InMemoryDriver::new()), config).unwrap();
    let entity = EntityId::random(EntityType::Device);
    let points: Vec<DataPoint> = (0..24 * 60)
        .map(|i| DataPoint::new("temp", i * 60_000, (i % 50) as f64))
        .collect();
    runtime
        .block_on(dao.save_all(TenantId::random(), &entity, &points, 0))
        .unwrap();

    let query = ReadQuery::aggregated("temp", 0, 24 * HOUR, HOUR, Aggregation::Max);
    c.bench_function("aggregated_read_24h", |b| {
        b.to_async(&runtime)
            .iter(|| async { dao.find_all(&entity, black_box(&query)).await.unwrap() })
    });
}

criterion_group!(benches, bench_split, bench_merge, bench_read);
criterion_main!(benches);
