/*!
 * Allocation Strategy Tests
 * Selection table and per-strategy reclamation behaviour
 */

use lifetime_bench::memory::BufferPool;
use lifetime_bench::runtime::RuntimeCollector;
use lifetime_bench::{AllocationStrategy, Configuration, ExternalMode, Runtime, TrialRunner};
use lifetime_bench::BenchError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn private_runtime() -> Runtime {
    Runtime::builder().with_pool(BufferPool::new()).build()
}

fn run_strategy(runtime: &Runtime, strategy: AllocationStrategy, repetitions: usize) -> usize {
    let report = TrialRunner::without_pause().run("strategy", repetitions, |_| -> Result<(), BenchError> {
        strategy.execute(runtime, 512, 512, 128)
    });
    assert_eq!(report.failures(), 0);
    report.trials.len()
}

#[test]
fn test_external_scoped_leaves_zero_outstanding() {
    let runtime = private_runtime();
    let trials = run_strategy(&runtime, AllocationStrategy::ExternalScoped, 5);

    assert_eq!(trials, 5);
    let stats = runtime.external().stats();
    assert_eq!(stats.outstanding_regions, 0);
    assert_eq!(stats.pending_finalization, 0);
    assert_eq!(stats.explicit_releases, 5);
}

#[test]
fn test_external_manual_release_reclaimed_eventually() {
    let runtime = private_runtime();
    let trials = run_strategy(&runtime, AllocationStrategy::ExternalManualRelease, 5);
    assert_eq!(trials, 5);

    // Straight after the series at most five regions await the finalizer
    assert!(runtime.external().outstanding_regions() <= 5);

    runtime.external().wait_for_pending_finalizers();
    let stats = runtime.external().stats();
    assert_eq!(stats.outstanding_regions, 0);
    assert_eq!(stats.explicit_releases, 0);
    assert_eq!(stats.finalizations, 5);
}

#[test]
fn test_pooled_reuses_one_region() {
    let runtime = private_runtime();
    run_strategy(&runtime, AllocationStrategy::Pooled, 5);

    let stats = runtime.pool().stats();
    assert_eq!(stats.regions_created, 1);
    assert_eq!(stats.reuses, 4);
    assert_eq!(stats.outstanding, 0);
}

#[test]
fn test_plain_managed_accumulates_until_collection() {
    let runtime = private_runtime();
    run_strategy(&runtime, AllocationStrategy::PlainManaged, 5);

    assert_eq!(runtime.heap().total_memory(), 5 * 512 * 512);
    // 512x512 buffers live on the large-object heap
    let outcome = runtime.control().request_collection(2, true, false);
    assert_eq!(outcome.freed_objects, 5);
    assert_eq!(runtime.heap().total_memory(), 0);
}

#[test]
fn test_selection_is_resolved_from_configuration() {
    let cases = [
        (ExternalMode::HGlobal, true, true, AllocationStrategy::ExternalScoped),
        (ExternalMode::CoTask, false, true, AllocationStrategy::ExternalManualRelease),
        (ExternalMode::Off, true, true, AllocationStrategy::Pooled),
        (ExternalMode::Off, true, false, AllocationStrategy::PlainManaged),
    ];
    for (mode, explicit, pooling, expected) in cases {
        let config = Configuration::default()
            .with_external_mode(mode)
            .with_explicit_release(explicit)
            .with_pooling(pooling);
        assert_eq!(config.strategy(), expected);
    }
}

fn any_configuration() -> impl Strategy<Value = Configuration> {
    (
        prop_oneof![
            Just(ExternalMode::Off),
            Just(ExternalMode::HGlobal),
            Just(ExternalMode::CoTask)
        ],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(mode, explicit, pooling)| {
            Configuration::default()
                .with_external_mode(mode)
                .with_explicit_release(explicit)
                .with_pooling(pooling)
        })
}

proptest! {
    #[test]
    fn prop_selection_is_deterministic(config in any_configuration()) {
        let first = AllocationStrategy::select(&config);
        prop_assert_eq!(first, AllocationStrategy::select(&config.clone()));

        let external = config.external_mode != ExternalMode::Off;
        prop_assert_eq!(
            external,
            matches!(first, AllocationStrategy::ExternalScoped | AllocationStrategy::ExternalManualRelease)
        );
    }
}
