/*!
 * Bench Module
 * Strategies, workloads and the trial runner that times them
 */

pub mod bitmap;
pub mod gc_demo;
pub mod optimization;
pub mod strategy;
pub mod trial;

// Re-export for convenience
pub use bitmap::{BitmapReport, BitmapWorkload};
pub use gc_demo::{GcDemo, GcDemoReport};
pub use optimization::{OptimizationReport, OptimizationWorkload};
pub use strategy::AllocationStrategy;
pub use trial::{SeriesReport, TrialResult, TrialRunner};

use crate::core::config::{ConfigError, Configuration};
use crate::core::errors::BenchError;
use crate::runtime::Runtime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named benchmark scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Bitmap,
    Gc,
    Optimization,
    All,
}

impl Scenario {
    /// Concrete scenarios this one stands for
    pub fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => vec![Scenario::Bitmap, Scenario::Gc, Scenario::Optimization],
            single => vec![single],
        }
    }

    pub fn series_name(self) -> &'static str {
        match self {
            Scenario::Bitmap => "bitmap processing",
            Scenario::Gc => "gc demo",
            Scenario::Optimization => "optimization techniques",
            Scenario::All => "all",
        }
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bitmap" => Ok(Scenario::Bitmap),
            "gc" => Ok(Scenario::Gc),
            "optimization" => Ok(Scenario::Optimization),
            "all" => Ok(Scenario::All),
            _ => Err(ConfigError::UnknownScenario(s.to_string())),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.series_name())
    }
}

/// Result value of one successful trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadReport {
    Bitmap(BitmapReport),
    Gc(GcDemoReport),
    Optimization(OptimizationReport),
}

/// One scenario run as a timed series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioRun {
    pub scenario: Scenario,
    pub series: SeriesReport,
    /// Reports of the trials that succeeded, in trial order
    pub reports: Vec<WorkloadReport>,
}

/// Run every concrete scenario behind `scenario` as its own series
pub fn run_scenario(
    scenario: Scenario,
    runtime: &Runtime,
    config: &Configuration,
    runner: &TrialRunner,
    repetitions: usize,
) -> Vec<ScenarioRun> {
    scenario
        .expand()
        .into_iter()
        .map(|single| {
            let mut reports = Vec::with_capacity(repetitions);
            let series = match single {
                Scenario::Bitmap => {
                    let workload = BitmapWorkload::from_config(config);
                    runner.run(single.series_name(), repetitions, |_| -> Result<(), BenchError> {
                        reports.push(WorkloadReport::Bitmap(workload.run(runtime)?));
                        Ok(())
                    })
                }
                Scenario::Gc => {
                    let workload = GcDemo::default();
                    runner.run(single.series_name(), repetitions, |_| -> Result<(), BenchError> {
                        reports.push(WorkloadReport::Gc(workload.run(runtime)?));
                        Ok(())
                    })
                }
                // `All` never survives `expand`
                Scenario::Optimization | Scenario::All => {
                    let workload = OptimizationWorkload::from_config(config);
                    runner.run(single.series_name(), repetitions, |_| -> Result<(), BenchError> {
                        reports.push(WorkloadReport::Optimization(workload.run(runtime)?));
                        Ok(())
                    })
                }
            };
            ScenarioRun {
                scenario: single,
                series,
                reports,
            }
        })
        .collect()
}
