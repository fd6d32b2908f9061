use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use relaykit_core::{BusConfig, EventBus, InvocationPolicy};

struct Sample(usize);

fn bus(name: &str, order: i32) -> EventBus {
    EventBus::with_config(
        BusConfig::named(name, order).with_policy(InvocationPolicy::Propagate),
    )
}

fn add_listeners(bus: &EventBus, count: usize, sink: &Arc<AtomicUsize>) {
    for i in 0..count {
        let sink = sink.clone();
        bus.listen::<Sample, _>((i % 7) as i32, move |s| {
            sink.fetch_add(s.0, Ordering::Relaxed);
        });
    }
}

fn bench_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_listeners");
    for count in [1usize, 16, 128] {
        let sink = Arc::new(AtomicUsize::new(0));
        let root = bus("root", 0);
        add_listeners(&root, count, &sink);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| root.send(black_box(&Sample(1))))
        });
    }
    group.finish();
}

fn bench_buses(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_buses");
    for count in [1usize, 16, 64] {
        let sink = Arc::new(AtomicUsize::new(0));
        let root = bus("root", 0);
        let nested: Vec<_> = (0..count)
            .map(|i| {
                let nested = Arc::new(bus(&format!("nested-{i}"), i as i32));
                add_listeners(&nested, 1, &sink);
                nested
            })
            .collect();
        for n in &nested {
            let _ = root.subscribe(n);
        }

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| root.send(black_box(&Sample(1))))
        });
    }
    group.finish();
}

fn bench_mixed(c: &mut Criterion) {
    let sink = Arc::new(AtomicUsize::new(0));
    let root = bus("root", 0);
    add_listeners(&root, 32, &sink);
    for i in 0..8 {
        let nested = Arc::new(bus(&format!("nested-{i}"), i));
        add_listeners(&nested, 4, &sink);
        let _ = root.subscribe(&nested);
    }

    c.bench_function("send_mixed", |b| b.iter(|| root.send(black_box(&Sample(1)))));
}

fn bench_subscribe_cycle(c: &mut Criterion) {
    let root = bus("root", 0);
    let nested = Arc::new(bus("nested", 0));

    c.bench_function("bus_subscribe_cycle", |b| {
        b.iter(|| {
            let _ = root.subscribe(&nested);
            root.unsubscribe(&nested)
        })
    });
}

criterion_group!(
    benches,
    bench_listeners,
    bench_buses,
    bench_mixed,
    bench_subscribe_cycle
);
criterion_main!(benches);
