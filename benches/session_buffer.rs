//! Benchmarks for the session buffer and persistence queue
//!
//! Covers the per-payload work the control loop does after fan-out:
//! - Appending relay-sized batches until the flush threshold
//! - Session switches that force an early flush
//! - Non-blocking offers against a saturated queue
//!
//! Platform: Cross-platform, CI-safe

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use paddock::hub::{PersistenceQueue, SessionBuffer};
use paddock::test_utils::frames;
use paddock::types::TelemetryPayload;
use std::hint::black_box;

fn bench_accumulate_to_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_accumulate");

    for batch in [1usize, 20, 100] {
        let payload = TelemetryPayload::new("race", frames(0, batch));
        group.throughput(Throughput::Elements(1000));

        group.bench_with_input(BenchmarkId::from_parameter(batch), &payload, |b, payload| {
            b.iter(|| {
                let mut buffer = SessionBuffer::new(1000);
                let mut flushed = 0;
                while flushed == 0 {
                    flushed = buffer.ingest(black_box(payload.clone())).len();
                }
                black_box(flushed)
            })
        });
    }

    group.finish();
}

fn bench_session_switch(c: &mut Criterion) {
    let first = TelemetryPayload::new("qualifying", frames(0, 20));
    let second = TelemetryPayload::new("race", frames(20, 20));

    c.bench_function("buffer_session_switch", |b| {
        let mut buffer = SessionBuffer::new(1000);
        b.iter(|| {
            let to_second = buffer.ingest(black_box(second.clone()));
            let to_first = buffer.ingest(black_box(first.clone()));
            black_box((to_second, to_first))
        })
    });
}

fn bench_offer_when_full(c: &mut Criterion) {
    let (queue, _receiver) = PersistenceQueue::bounded(100);
    let batch = TelemetryPayload::new("race", frames(0, 1000));
    while queue.pending() < queue.capacity() {
        queue.offer(batch.clone());
    }

    c.bench_function("queue_offer_full", |b| {
        b.iter(|| black_box(queue.offer(black_box(batch.clone()))))
    });
}

criterion_group!(benches, bench_accumulate_to_threshold, bench_session_switch, bench_offer_when_full);
criterion_main!(benches);
