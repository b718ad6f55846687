//! Benchmarks for request normalization and aggregation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use raspe::aggregate::{record, PageResult, ResultAggregator, TermBatch};
use raspe::params::{expand, parse_date};

fn normalization_benchmark(c: &mut Criterion) {
    c.bench_function("parse_date", |b| {
        b.iter(|| {
            for value in ["2024-03-15", "15/03/2024", "20240315"] {
                black_box(parse_date(black_box(value), "data_inicio").ok());
            }
        });
    });

    c.bench_function("expand", |b| {
        b.iter(|| black_box(expand(black_box("(saúde OU educação) E (lei OU decreto) E federal")).ok()));
    });
}

fn aggregation_benchmark(c: &mut Criterion) {
    let batches: Vec<TermBatch> = (0..10)
        .map(|term| {
            let mut batch = TermBatch::new(format!("termo-{term}"));
            for page in (1..=20).rev() {
                let result: PageResult = (0..10)
                    .map(|row| record([("id", format!("{term}-{page}-{row}")), ("titulo", "Lei".to_string())]))
                    .collect();
                batch.insert(page, result);
            }
            batch
        })
        .collect();

    c.bench_function("aggregate_2000_rows", |b| {
        b.iter(|| {
            let mut aggregator = ResultAggregator::new();
            for (index, batch) in batches.iter().cloned().enumerate() {
                aggregator.add(index, batch);
            }
            black_box(aggregator.finish().len())
        });
    });
}

criterion_group!(benches, normalization_benchmark, aggregation_benchmark);
criterion_main!(benches);
