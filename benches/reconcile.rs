//! Reconciler benchmark suite.
//!
//! Measures folding streamed answers into the conversation log:
//! - Delta counts: 100, 1000, 10000
//! - Frame decoding plus reconciliation for the same streams
//!
//! Run with: cargo bench --bench reconcile
//! Results saved to: target/criterion/

use std::hint::black_box;

use code_doctor::{ProtocolEvent, Reconciler, decode_frame};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const DELTA_COUNTS: &[usize] = &[100, 1_000, 10_000];
const DELTA_TEXT: &str = "let x = compute(y); ";

// ============================================================================
// Helpers
// ============================================================================

fn stream_events(deltas: usize) -> Vec<ProtocolEvent> {
    let mut events = Vec::with_capacity(deltas + 2);
    events.push(ProtocolEvent::Pending);
    events.extend((0..deltas).map(|_| ProtocolEvent::Delta {
        text: DELTA_TEXT.to_owned(),
    }));
    events.push(ProtocolEvent::End);
    events
}

fn stream_frames(deltas: usize) -> Vec<String> {
    let mut frames = Vec::with_capacity(deltas + 2);
    frames.push(r#"{"status":"PENDING","message":"reviewing"}"#.to_owned());
    frames.extend(
        (0..deltas).map(|_| format!(r#"{{"status":"DELTA","text":"{DELTA_TEXT}"}}"#)),
    );
    frames.push(r#"{"status":"END"}"#.to_owned());
    frames
}

// ============================================================================
// Benchmark: Apply Events
// ============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for &count in DELTA_COUNTS {
        let events = stream_events(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("deltas", count), &events, |b, events| {
            b.iter(|| {
                let mut reconciler = Reconciler::new("error");
                reconciler.push_user("print(1)", "Python");
                for event in events.iter().cloned() {
                    reconciler.apply(event);
                }
                black_box(reconciler.log().len())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decode And Apply
// ============================================================================

fn bench_decode_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_apply");

    for &count in DELTA_COUNTS {
        let frames = stream_frames(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("frames", count), &frames, |b, frames| {
            b.iter(|| {
                let mut reconciler = Reconciler::new("error");
                for frame in frames {
                    if let Ok(event) = decode_frame(frame) {
                        reconciler.apply(event);
                    }
                }
                black_box(reconciler.is_busy())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply, bench_decode_apply);
criterion_main!(benches);
