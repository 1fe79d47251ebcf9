//! Benchmarks for evaluation and subroutine invocation.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use termgraph::{CodeUnit, Kernel, SubroutineBuilder, TermId, Value};

/// `n` chained additions over one constant.
fn chain(unit: &mut CodeUnit, n: usize) -> TermId {
    let one = unit.wrap(None, 1_i64).unwrap();
    let mut last = one;
    for _ in 0..n {
        last = unit.apply("add", &[last, one], None).unwrap();
    }
    last
}

/// Invalidate the root and re-evaluate the whole chain
fn bench_dirty_chain(c: &mut Criterion) {
    let kernel = Kernel::shared().unwrap();
    let mut group = c.benchmark_group("dirty_chain");

    for n in [10, 100, 400] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut unit = CodeUnit::new(kernel.clone());
            let last = chain(&mut unit, n);
            let root = unit.all_terms().next().unwrap().id;
            let mut value = 0_i64;

            b.iter(|| {
                value += 1;
                unit.feedback(root, Value::Int(value)).unwrap();
                black_box(unit.evaluate(last).unwrap());
            });
        });
    }

    group.finish();
}

/// Clean chain: evaluate returns cached values
fn bench_clean_chain(c: &mut Criterion) {
    let kernel = Kernel::shared().unwrap();
    let mut unit = CodeUnit::new(kernel);
    let last = chain(&mut unit, 100);
    unit.evaluate(last).unwrap();

    c.bench_function("clean_chain_100", |b| {
        b.iter(|| black_box(unit.evaluate(last).unwrap()));
    });
}

/// Stateful terms recompute every pass
fn bench_accumulate(c: &mut Criterion) {
    let kernel = Kernel::shared().unwrap();
    let mut unit = CodeUnit::new(kernel);
    let step = unit.wrap(None, 0_i64).unwrap();
    let total = unit.apply("accumulate", &[step], None).unwrap();

    c.bench_function("accumulate", |b| {
        b.iter(|| black_box(unit.evaluate(total).unwrap()));
    });
}

fn bench_invoke(c: &mut Criterion) {
    let kernel = Kernel::shared().unwrap();
    let mut unit = CodeUnit::new(kernel);
    let int = unit.kernel_terms().unwrap().int;

    let mut builder = SubroutineBuilder::new(&mut unit, "polynomial").unwrap();
    builder.add_input("x", int).unwrap();
    builder.wrap(Some("three"), 3_i64).unwrap();
    builder.call("mult", &["x", "x"], Some("square")).unwrap();
    builder.call("mult", &["x", "three"], Some("linear")).unwrap();
    builder.call("add", &["square", "linear"], Some("result")).unwrap();
    let polynomial = builder.finish().unwrap();

    c.bench_function("invoke_polynomial", |b| {
        let mut x = 0_i64;
        b.iter(|| {
            x = (x + 1) % 1000;
            black_box(unit.invoke(polynomial, &[Value::Int(x)]).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_dirty_chain,
    bench_clean_chain,
    bench_accumulate,
    bench_invoke
);
criterion_main!(benches);
