/*!
 * Trial Runner Tests
 * Ordering, timing and failure isolation across repetitions
 */

use lifetime_bench::core::Guard;
use lifetime_bench::memory::BufferPool;
use lifetime_bench::{BenchError, Runtime, TrialRunner};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;

fn private_runtime() -> Runtime {
    Runtime::builder().with_pool(BufferPool::new()).build()
}

#[test]
fn test_total_time_covers_trials_and_pauses() {
    let runner = TrialRunner::new(Duration::from_millis(10));
    let report = runner.run("sleepy", 4, |_| {
        std::thread::sleep(Duration::from_millis(5));
        Ok::<_, BenchError>(())
    });

    assert_eq!(report.trials.len(), 4);
    assert!(report.total_elapsed >= report.trial_time_sum());
    assert!(report.total_elapsed >= Duration::from_millis(4 * 5 + 3 * 10));
    for trial in &report.trials {
        assert!(trial.elapsed >= Duration::from_millis(5));
        assert!(trial.millis() >= 5);
    }
}

#[test]
fn test_failure_in_trial_k_does_not_stop_later_trials() {
    let runtime = private_runtime();
    let runner = TrialRunner::without_pause();
    let mut executed = Vec::new();

    let report = runner.run("scoped with failure", 5, |trial| -> Result<(), BenchError> {
        executed.push(trial);
        let mut buffer = runtime.external().scoped_buffer(512, 512)?;
        buffer.fill(128)?;
        if trial == 2 {
            return Err(BenchError::workload("injected failure after fill"));
        }
        Ok(())
    });

    assert_eq!(executed, vec![0, 1, 2, 3, 4]);
    assert_eq!(report.failures(), 1);
    assert!(report.trials[2].failed);

    // The buffer acquired by the failing trial was released on the error path
    let stats = runtime.external().stats();
    assert_eq!(stats.allocations, 5);
    assert_eq!(stats.explicit_releases, 5);
    assert_eq!(stats.outstanding_regions, 0);
}

#[test]
fn test_panicking_trial_releases_scoped_buffer() {
    let runtime = private_runtime();
    let report = TrialRunner::without_pause().run("scoped with panic", 3, |trial| -> Result<(), BenchError> {
        let mut buffer = runtime.external().scoped_buffer(64, 64)?;
        buffer.fill(1)?;
        if trial == 0 {
            panic!("trial zero panicked mid-fill");
        }
        Ok::<_, BenchError>(())
    });

    assert_eq!(report.failures(), 1);
    assert_eq!(runtime.external().outstanding_regions(), 0);
}

#[test]
fn test_use_after_release_is_recorded_not_raised() {
    let runtime = private_runtime();
    let report = TrialRunner::without_pause().run("misuse", 2, |_| -> Result<(), BenchError> {
        let mut buffer = runtime.external().allocate_buffer(8, 8)?;
        buffer.release()?;
        buffer.fill(1)?;
        Ok::<_, BenchError>(())
    });

    assert_eq!(report.failures(), 2);
    assert!(report.trials[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("Use after release"));
}

#[test]
fn test_series_report_serializes() {
    let report = TrialRunner::without_pause().run("json", 2, |_| Ok::<_, BenchError>(()));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["name"], "json");
    assert_eq!(json["trials"].as_array().map(Vec::len), Some(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_results_in_trial_order(repetitions in 0usize..20, failing in proptest::collection::vec(any::<bool>(), 20)) {
        let report = TrialRunner::without_pause().run("prop", repetitions, |i| {
            if failing[i] {
                Err(BenchError::workload("scheduled failure"))
            } else {
                Ok(())
            }
        });

        prop_assert_eq!(report.trials.len(), repetitions);
        for (i, trial) in report.trials.iter().enumerate() {
            prop_assert_eq!(trial.trial_index, i);
            prop_assert_eq!(trial.failed, failing[i]);
        }
        prop_assert!(report.total_elapsed >= report.trial_time_sum());
    }
}
