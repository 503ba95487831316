//! Materialization throughput over representative specification shapes.
//!
//! Run with `cargo bench --bench materialize`. Handle setup is excluded
//! from the measured region via `iter_batched`.

use callseq::{call, chain, parallel, sub_range, Harness, ScriptEngine, SetupFn};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

const WIDTHS: [usize; 3] = [8, 64, 512];

fn rig(width: usize) -> (Harness, Vec<SetupFn>) {
    let harness = Harness::new();
    let engine = ScriptEngine::new(&harness);
    let parts = (0..width)
        .map(|i| call(engine.expect(&harness, &format!("call.{i}"))))
        .collect();
    (harness, parts)
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("declare_chain");
    for width in WIDTHS {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_function(width.to_string(), |b| {
            b.iter_batched(
                || rig(width),
                |(mut harness, parts)| harness.declare(chain(parts)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("declare_parallel");
    for width in WIDTHS {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_function(width.to_string(), |b| {
            b.iter_batched(
                || rig(width),
                |(mut harness, parts)| harness.declare(parallel(parts)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_sub_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("declare_sub_range");
    for width in WIDTHS {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_function(width.to_string(), |b| {
            let hi = (width as isize) / 2;
            b.iter_batched(
                || rig(width),
                |(mut harness, parts)| harness.declare(sub_range(1, hi, chain(parts))),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chain, bench_parallel, bench_sub_range);
criterion_main!(benches);
