/*!
 * Lifetime Bench Library
 * Buffer lifetime strategies, a simulated managed runtime and the trial
 * harness that compares them
 */

pub mod bench;
pub mod core;
pub mod memory;
pub mod monitoring;
pub mod runtime;

// Re-exports
pub use bench::{
    run_scenario, AllocationStrategy, BitmapWorkload, GcDemo, OptimizationWorkload, Scenario,
    ScenarioRun, SeriesReport, TrialResult, TrialRunner, WorkloadReport,
};
pub use crate::core::{configuration, BenchError, BenchResult, Configuration, ExternalMode};
pub use memory::{BufferPool, ExternalBuffer, ExternalHeap, PooledRegion, ScopedBuffer};
pub use monitoring::init_tracing;
pub use runtime::{CollectorControl, CollectorSnapshot, LatencyMode, ManagedHeap, Runtime};
