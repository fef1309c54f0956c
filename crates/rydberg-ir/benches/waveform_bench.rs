//! Benchmarks for waveform evaluation and flattening
//!
//! Run with: cargo bench -p rydberg-ir

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use rydberg_ir::{Bindings, Interpolation, Interval, Scalar, Waveform};

/// A piecewise-linear waveform with `n` segments.
fn ramp_chain(n: usize) -> Waveform {
    let mut w = Waveform::linear(0, 1, 1);
    for i in 1..n {
        let start = Decimal::from(i % 7);
        let stop = Decimal::from((i + 1) % 7);
        w = w.append(&Waveform::linear(start, stop, Decimal::new(5, 1)));
    }
    w
}

/// Benchmark pointwise evaluation
fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");
    let bindings = Bindings::new();

    for n in &[1, 10, 100] {
        let w = ramp_chain(*n);
        let t = w.duration(&bindings).unwrap() / Decimal::from(2);
        group.bench_with_input(BenchmarkId::new("append", n), &w, |b, w| {
            b.iter(|| w.eval(black_box(t), &bindings).unwrap());
        });
    }

    let symbolic = Waveform::linear(Scalar::var("a"), Scalar::var("b"), Scalar::var("t"));
    let bound = Bindings::new()
        .with("a", Decimal::ZERO)
        .unwrap()
        .with("b", Decimal::from(15))
        .unwrap()
        .with("t", Decimal::from(4))
        .unwrap();
    group.bench_function("symbolic_linear", |b| {
        b.iter(|| symbolic.eval(black_box(Decimal::ONE), &bound).unwrap());
    });

    group.finish();
}

/// Benchmark flattening of composed waveforms
fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");
    let bindings = Bindings::new();

    for n in &[10, 100] {
        let w = ramp_chain(*n);
        let d = w.duration(&bindings).unwrap();
        let sliced = w.slice(Interval::between(Decimal::new(25, 2), d - Decimal::ONE));
        group.bench_with_input(BenchmarkId::new("slice", n), &sliced, |b, w| {
            b.iter(|| w.flatten(black_box(&bindings)).unwrap());
        });

        let summed = w.add(&w.scale(Decimal::new(5, 1)).neg());
        group.bench_with_input(BenchmarkId::new("sum", n), &summed, |b, w| {
            b.iter(|| w.flatten(black_box(&bindings)).unwrap());
        });
    }

    let sampled = Waveform::poly(
        vec![Scalar::from(0), Scalar::from(2), Scalar::from(-1)],
        Decimal::from(2),
    )
    .sample(Decimal::new(5, 2), Interpolation::Linear);
    group.bench_function("sample", |b| {
        b.iter(|| sampled.flatten(black_box(&bindings)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_eval, bench_flatten);

criterion_main!(benches);
