/*!
 * Collector Control Tests
 * Latency-mode scoping, forced collections and memory readings
 */

use lifetime_bench::runtime::{
    CollectorControl, CollectorError, LatencyMode, ManagedHeap, RuntimeCollector,
};
use std::sync::Arc;
use lifetime_bench::{BenchError, Runtime};
use pretty_assertions::assert_eq;

#[test]
fn test_mode_restored_after_normal_return() {
    let runtime = Runtime::new();
    let control = runtime.control();

    let inside = control
        .with_latency_mode(LatencyMode::LowLatency, || {
            Ok::<_, BenchError>(control.latency_mode())
        })
        .unwrap();

    assert_eq!(inside, LatencyMode::LowLatency);
    assert_eq!(control.latency_mode(), LatencyMode::Interactive);
}

#[test]
fn test_mode_restored_after_failure() {
    let runtime = Runtime::new();
    runtime.heap().set_latency_mode(LatencyMode::Batch);
    let control = runtime.control();

    let result = control.with_latency_mode(LatencyMode::SustainedLowLatency, || {
        Err::<(), _>(BenchError::workload("body failed"))
    });

    assert!(matches!(result, Err(BenchError::Workload(_))));
    assert_eq!(control.latency_mode(), LatencyMode::Batch);
}

#[test]
fn test_nested_scope_is_collector_error() {
    let runtime = Runtime::new();
    let control = runtime.control();

    let result = control.with_latency_mode(LatencyMode::LowLatency, || {
        control.with_latency_mode(LatencyMode::Batch, || Ok::<_, BenchError>(()))
    });

    assert!(matches!(
        result,
        Err(BenchError::Collector(CollectorError::LatencyScopeActive {
            current: LatencyMode::LowLatency
        }))
    ));
    assert_eq!(control.latency_mode(), LatencyMode::Interactive);
}

#[test]
fn test_scope_shared_by_controls_over_same_heap() {
    let heap = ManagedHeap::new();
    let first = CollectorControl::new(Arc::new(heap.clone()));
    let second = CollectorControl::new(Arc::new(heap.clone()));

    let outer = first.enter_latency_mode(LatencyMode::LowLatency).unwrap();
    assert!(matches!(
        second.enter_latency_mode(LatencyMode::Batch),
        Err(CollectorError::LatencyScopeActive {
            current: LatencyMode::LowLatency
        })
    ));
    assert_eq!(heap.latency_mode(), LatencyMode::LowLatency);

    drop(outer);
    assert_eq!(heap.latency_mode(), LatencyMode::Interactive);
    let reopened = second.enter_latency_mode(LatencyMode::Batch).unwrap();
    assert_eq!(reopened.previous(), LatencyMode::Interactive);
}

#[test]
fn test_low_latency_scope_suppresses_full_automatic_collections() {
    let heap = ManagedHeap::with_budgets(usize::MAX / 4, 100_000);
    let runtime = Runtime::builder().with_heap(heap).build();
    let control = runtime.control();

    control
        .with_latency_mode(LatencyMode::LowLatency, || {
            for _ in 0..4 {
                drop(runtime.heap().allocate(90_000)?);
            }
            Ok::<_, BenchError>(())
        })
        .unwrap();
    assert_eq!(control.counters().collection_counts[2], 0);

    // Outside the scope the same pressure reaches gen2
    drop(runtime.heap().allocate(90_000).unwrap());
    drop(runtime.heap().allocate(90_000).unwrap());
    assert!(control.counters().collection_counts[2] >= 1);
}

#[test]
fn test_measure_reports_growth() {
    let runtime = Runtime::new();
    let control = runtime.control();

    let (buffer, snapshot) = control
        .measure(|| runtime.heap().allocate(4096))
        .unwrap();

    assert_eq!(buffer.len(), 4096);
    assert_eq!(snapshot.delta(), 4096);
}

#[test]
fn test_blocking_collection_waits_for_finalizers() {
    let runtime = Runtime::new();
    for _ in 0..3 {
        let mut buffer = runtime.external().allocate_buffer(128, 128).unwrap();
        buffer.fill(9).unwrap();
    }

    runtime.control().request_collection(2, true, false);
    let stats = runtime.external().stats();
    assert_eq!(stats.outstanding_regions, 0);
    assert_eq!(stats.finalizations, 3);
}

#[test]
fn test_full_snapshot_collects_first() {
    let runtime = Runtime::new();
    drop(runtime.heap().allocate(100_000).unwrap());
    drop(runtime.heap().allocate(1_000).unwrap());

    assert_eq!(runtime.control().snapshot_memory(), 101_000);
    assert_eq!(runtime.control().snapshot_memory_full(), 0);
}
