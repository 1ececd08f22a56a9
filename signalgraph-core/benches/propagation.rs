//! Invalidation and recomputation cost over a chain of formulas.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use signalgraph_core::reactive::{Formula, Tracker, Value};

fn chain(tracker: &std::rc::Rc<Tracker>, source: &Value<u64>, length: usize) -> Formula<u64> {
    let mut tail = Formula::try_new(tracker, {
        let source = source.clone();
        move || source.get()
    });
    for _ in 1..length {
        let previous = tail.clone();
        tail = Formula::try_new(tracker, move || Ok(previous.get()? + 1));
    }
    tail
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    for length in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::new("write_then_read", length), &length, |b, &length| {
            let tracker = Tracker::new();
            let source = Value::new(&tracker, 0u64);
            let tail = chain(&tracker, &source, length);
            tail.get().ok();

            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                source.set(n).ok();
                black_box(tail.get().ok())
            });
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    c.bench_function("fan_out_invalidate_1000", |b| {
        let tracker = Tracker::new();
        let source = Value::new(&tracker, 0u64);
        let readers: Vec<_> = (0..1000)
            .map(|i| {
                let source = source.clone();
                Formula::try_new(&tracker, move || Ok(source.get()? + i))
            })
            .collect();

        let mut n = 0u64;
        b.iter(|| {
            for reader in &readers {
                reader.get().ok();
            }
            n += 1;
            source.set(n).ok();
        });
    });
}

criterion_group!(benches, bench_chain, bench_fan_out);
criterion_main!(benches);
