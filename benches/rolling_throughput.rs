#![cfg(feature = "bench")]
use circuit_telemetry::{BucketKind, Clock, CounterWindow, LatencyWindow, ManualClock};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn manual_clock() -> (Arc<ManualClock>, Arc<dyn Clock>) {
    let clock = Arc::new(ManualClock::at_secs(1_700_000_000));
    let as_dyn: Arc<dyn Clock> = clock.clone();
    (clock, as_dyn)
}

fn bench_counter_window(c: &mut Criterion) {
    let (clock, dyn_clock) = manual_clock();
    let sum = CounterWindow::with_clock(BucketKind::Sum, dyn_clock.clone());
    c.bench_function("counter_increment_1k_then_avg", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                sum.increment(black_box(1.0));
            }
            clock.advance_secs(1);
            black_box(sum.avg())
        })
    });

    let max = CounterWindow::with_clock(BucketKind::Max, dyn_clock);
    c.bench_function("counter_update_max_1k", |b| {
        b.iter(|| {
            for i in 0..1000 {
                max.update_max(black_box(f64::from(i)));
            }
            black_box(max.max())
        })
    });
}

fn bench_latency_window(c: &mut Criterion) {
    let (clock, dyn_clock) = manual_clock();
    let latency = LatencyWindow::with_clock(dyn_clock);
    c.bench_function("latency_add_1k_then_p99", |b| {
        b.iter(|| {
            for i in 0..1000u64 {
                latency.add(Duration::from_millis(black_box(i % 250)));
            }
            clock.advance_secs(1);
            black_box(latency.percentile(99.0))
        })
    });

    c.bench_function("latency_cached_percentile", |b| {
        b.iter(|| black_box(latency.percentile(black_box(95.0))))
    });
}

criterion_group!(benches, bench_counter_window, bench_latency_window);
criterion_main!(benches);
