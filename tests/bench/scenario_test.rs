/*!
 * Scenario Tests
 * End-to-end series for the bitmap, GC and optimization workloads
 */

use lifetime_bench::bench::WorkloadReport;
use lifetime_bench::core::limits::{GC_DEMO_OBJECTS, LARGE_OBJECT_THRESHOLD};
use lifetime_bench::memory::BufferPool;
use lifetime_bench::runtime::LatencyMode;
use lifetime_bench::{
    run_scenario, Configuration, ExternalMode, GcDemo, Runtime, Scenario, TrialRunner,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn private_runtime() -> Runtime {
    Runtime::builder().with_pool(BufferPool::new()).build()
}

#[test]
fn test_gc_scenario_collection_never_increases_reading() {
    let runtime = private_runtime();
    let report = GcDemo::default()
        .with_latency_work(Duration::from_millis(1))
        .run(&runtime)
        .unwrap();

    let allocated: usize = (0..GC_DEMO_OBJECTS).map(|i| LARGE_OBJECT_THRESHOLD + i).sum();
    assert_eq!(report.after_alloc, report.before + allocated);
    assert!(report.snapshot.after_bytes <= report.after_alloc);
    assert!(report.snapshot.delta() <= 0);
    assert!(report.collection.compacted);
    assert_eq!(report.latency_mode_after, LatencyMode::Interactive);
}

#[test]
fn test_bitmap_series_with_scoped_strategy() {
    let runtime = private_runtime();
    let config = Configuration::default();
    let runs = run_scenario(
        Scenario::Bitmap,
        &runtime,
        &config,
        &TrialRunner::without_pause(),
        5,
    );

    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.series.trials.len(), 5);
    assert_eq!(run.series.failures(), 0);
    assert_eq!(run.reports.len(), 5);
    assert_eq!(runtime.external().outstanding_regions(), 0);
    assert_eq!(runtime.external().stats().allocations, 50);
}

#[test]
fn test_bitmap_series_with_collection_drains_finalizers() {
    let runtime = private_runtime();
    let config = Configuration::default()
        .with_external_mode(ExternalMode::CoTask)
        .with_explicit_release(false)
        .with_collection_trigger(Some(2));
    let runs = run_scenario(
        Scenario::Bitmap,
        &runtime,
        &config,
        &TrialRunner::without_pause(),
        2,
    );

    let WorkloadReport::Bitmap(last) = &runs[0].reports[1] else {
        panic!("expected bitmap report");
    };
    assert_eq!(last.fill_value, 64);
    assert!(last.collection.is_some());
    // The blocking collection waited for every abandoned buffer
    assert_eq!(last.external.outstanding_regions, 0);
    assert_eq!(last.external.finalizations, 20);
}

#[test]
fn test_all_runs_three_series() {
    let runtime = private_runtime();
    let config = Configuration::default().with_parallel_degree(std::num::NonZeroUsize::new(2));
    let runs = run_scenario(
        Scenario::All,
        &runtime,
        &config,
        &TrialRunner::without_pause(),
        1,
    );

    let scenarios: Vec<_> = runs.iter().map(|r| r.scenario).collect();
    assert_eq!(
        scenarios,
        vec![Scenario::Bitmap, Scenario::Gc, Scenario::Optimization]
    );
    assert!(runs.iter().all(|r| r.series.failures() == 0));

    let WorkloadReport::Optimization(optimization) = &runs[2].reports[0] else {
        panic!("expected optimization report");
    };
    assert_eq!(optimization.parallel.map(|p| p.degree), Some(2));
    assert_eq!(optimization.tasks.map(|t| t.tasks), Some(4));
    assert_eq!(optimization.buffer.bytes, 10_000_000);
}
