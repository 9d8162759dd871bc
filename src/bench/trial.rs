/*!
 * Trial Runner
 *
 * Repeats an operation, timing each trial and isolating failures so that
 * one bad trial never stops the series.
 */

use crate::core::limits::{DEFAULT_REPETITIONS, DEFAULT_TRIAL_PAUSE};
use crate::monitoring::generate_trace_id;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

/// Outcome of one trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrialResult {
    pub trial_index: usize,
    pub elapsed: Duration,
    pub failed: bool,
    pub error_message: Option<String>,
}

impl TrialResult {
    /// Whole milliseconds spent in the trial
    pub fn millis(&self) -> u128 {
        self.elapsed.as_millis()
    }

    fn completed(trial_index: usize, elapsed: Duration) -> Self {
        Self {
            trial_index,
            elapsed,
            failed: false,
            error_message: None,
        }
    }

    fn failed(trial_index: usize, elapsed: Duration, message: String) -> Self {
        Self {
            failed: true,
            error_message: Some(message),
            ..Self::completed(trial_index, elapsed)
        }
    }
}

/// All trials of one named series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeriesReport {
    pub series_id: String,
    pub name: String,
    pub repetitions: usize,
    pub pause: Duration,
    pub trials: Vec<TrialResult>,
    /// Wall clock for the whole series, pauses included
    pub total_elapsed: Duration,
}

impl SeriesReport {
    pub fn failures(&self) -> usize {
        self.trials.iter().filter(|t| t.failed).count()
    }

    /// Time spent inside trials, pauses excluded
    pub fn trial_time_sum(&self) -> Duration {
        self.trials.iter().map(|t| t.elapsed).sum()
    }

    pub fn total_millis(&self) -> u64 {
        self.total_elapsed.as_millis() as u64
    }
}

/// Repeated-trial executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialRunner {
    pause: Duration,
}

impl TrialRunner {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }

    /// Runner without inter-trial pauses
    pub fn without_pause() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Run `operation` the default number of times
    pub fn run_default<F, E>(&self, name: &str, operation: F) -> SeriesReport
    where
        F: FnMut(usize) -> Result<(), E>,
        E: Display,
    {
        self.run(name, DEFAULT_REPETITIONS, operation)
    }

    /// Run `operation` `repetitions` times
    ///
    /// Both `Err` returns and panics are recorded on the trial and never
    /// leave this function. The pause separates trials and is not applied
    /// after the last one.
    pub fn run<F, E>(&self, name: &str, repetitions: usize, mut operation: F) -> SeriesReport
    where
        F: FnMut(usize) -> Result<(), E>,
        E: Display,
    {
        let series_id = generate_trace_id();
        let span = info_span!("series", %series_id, name, repetitions);
        let _entered = span.enter();

        info!(pause_ms = self.pause.as_millis() as u64, "Series started");
        let series_start = Instant::now();
        let mut trials = Vec::with_capacity(repetitions);

        for trial_index in 0..repetitions {
            let start = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| operation(trial_index)));
            let elapsed = start.elapsed();

            let result = match outcome {
                Ok(Ok(())) => {
                    info!(
                        trial = trial_index + 1,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Trial completed"
                    );
                    TrialResult::completed(trial_index, elapsed)
                }
                Ok(Err(e)) => {
                    let message = e.to_string();
                    warn!(trial = trial_index + 1, error = %message, "Trial failed");
                    TrialResult::failed(trial_index, elapsed, message)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(trial = trial_index + 1, panic = %message, "Trial panicked");
                    TrialResult::failed(trial_index, elapsed, format!("panic: {}", message))
                }
            };
            trials.push(result);

            if trial_index + 1 < repetitions && !self.pause.is_zero() {
                std::thread::sleep(self.pause);
            }
        }

        let report = SeriesReport {
            series_id,
            name: name.to_string(),
            repetitions,
            pause: self.pause,
            trials,
            total_elapsed: series_start.elapsed(),
        };
        info!(
            total_ms = report.total_millis(),
            failures = report.failures(),
            "Series finished"
        );
        report
    }
}

impl Default for TrialRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TRIAL_PAUSE)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
