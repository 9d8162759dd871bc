/*!
 * Lifetime Bench - Main Entry Point
 *
 * Runs one benchmark scenario (or all of them) as timed series:
 * - bitmap: allocate/fill/retire buffers through the configured strategy
 * - gc: latency scope, large-object burst, forced compacting collection
 * - optimization: pooling, latency scope, parallel loop, tasks, vector add
 */

use lifetime_bench::core::limits::DEFAULT_REPETITIONS;
use lifetime_bench::{
    configuration, init_tracing, run_scenario, BenchError, Runtime, Scenario, TrialRunner,
};
use miette::IntoDiagnostic;
use tracing::{info, warn};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Prints the JSON summary to stdout when set to `1` or `true`
const ENV_JSON_SUMMARY: &str = "LIFETIME_BENCH_JSON";

fn main() -> miette::Result<()> {
    init_tracing();

    let scenario = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<Scenario>().map_err(BenchError::from)?,
        None => Scenario::All,
    };

    let config = configuration();
    let strategy = config.strategy();
    info!(%scenario, %strategy, "Lifetime bench starting");

    let runtime = Runtime::new();
    let runner = TrialRunner::default();
    let runs = run_scenario(scenario, &runtime, config, &runner, DEFAULT_REPETITIONS);

    for run in &runs {
        info!(
            series = %run.scenario,
            series_id = %run.series.series_id,
            total_ms = run.series.total_millis(),
            trial_ms = run.series.trial_time_sum().as_millis() as u64,
            failures = run.series.failures(),
            "Series summary"
        );
        for trial in run.series.trials.iter().filter(|t| t.failed) {
            warn!(
                series = %run.scenario,
                trial = trial.trial_index + 1,
                error = trial.error_message.as_deref().unwrap_or("unknown"),
                "Failed trial"
            );
        }
    }

    runtime.external().wait_for_pending_finalizers();
    let external = runtime.external().stats();
    let counters = runtime.control().counters();
    info!(
        outstanding_regions = external.outstanding_regions,
        explicit_releases = external.explicit_releases,
        finalizations = external.finalizations,
        managed_bytes = counters.total_memory,
        collections = ?counters.collection_counts,
        compactions = counters.compactions,
        pool_reuse_ratio = runtime.pool().stats().reuse_ratio(),
        "Final counters"
    );

    let json_summary = std::env::var(ENV_JSON_SUMMARY)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);
    if json_summary {
        let summary = serde_json::json!({
            "configuration": config,
            "strategy": strategy,
            "runs": runs,
            "external": external,
            "runtime": counters,
        });
        let rendered = serde_json::to_string_pretty(&summary).into_diagnostic()?;
        println!("{}", rendered);
    }

    Ok(())
}
