/*!
 * Optimization Workloads
 *
 * Small independent techniques run back to back: pooled vs plain buffers,
 * a sustained-low-latency scope, a bounded parallel loop, a task fan-out
 * and a vectorised add. Each part is skipped when its setting is off.
 */

use crate::core::config::Configuration;
use crate::core::errors::{BenchError, BenchResult};
use crate::core::limits::{
    LATENCY_SCOPE_ALLOCATION, LATENCY_SCOPE_WORK, OPTIMIZATION_BUFFER_LEN, PARALLEL_CHUNK,
    SIMD_VECTORS, TASK_COUNT, WORK_DIVISOR,
};
use crate::core::simd::{self, SimdCapabilities};
use crate::runtime::{LatencyMode, Runtime};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Pooled or plain large-buffer fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BufferFillOutcome {
    pub pooled: bool,
    pub bytes: usize,
    /// Sum of the first `bytes` bytes after the fill
    pub checksum: u64,
}

/// Sustained-low-latency section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LatencyScopeOutcome {
    pub previous: LatencyMode,
    pub inside: LatencyMode,
    pub restored: LatencyMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParallelOutcome {
    pub degree: usize,
    pub iterations: usize,
    pub checksum: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskOutcome {
    pub tasks: usize,
    pub checksum: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimdOutcome {
    pub lanes: usize,
    pub elements: usize,
    pub first: f32,
    pub hardware_accelerated: bool,
}

/// Everything the optimization workload produced; skipped parts are `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationReport {
    pub buffer: BufferFillOutcome,
    pub latency: LatencyScopeOutcome,
    pub parallel: Option<ParallelOutcome>,
    pub tasks: Option<TaskOutcome>,
    pub simd: Option<SimdOutcome>,
}

/// Optimization workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationWorkload {
    pub buffer_len: usize,
    pub pooling: bool,
    pub parallel_degree: Option<NonZeroUsize>,
    pub tasks: bool,
    pub simd: bool,
    pub latency_work: Duration,
}

impl OptimizationWorkload {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            buffer_len: OPTIMIZATION_BUFFER_LEN,
            pooling: config.pooling_enabled,
            parallel_degree: config.parallel_degree,
            tasks: config.tasks_enabled,
            simd: config.simd_enabled,
            latency_work: LATENCY_SCOPE_WORK,
        }
    }

    pub fn with_buffer_len(mut self, len: usize) -> Self {
        self.buffer_len = len;
        self
    }

    pub fn with_latency_work(mut self, work: Duration) -> Self {
        self.latency_work = work;
        self
    }

    pub fn run(&self, runtime: &Runtime) -> BenchResult<OptimizationReport> {
        let buffer = self.fill_buffer(runtime)?;
        let latency = self.latency_scope(runtime)?;
        let work = self.buffer_len / WORK_DIVISOR;

        let parallel = match self.parallel_degree {
            Some(degree) => Some(parallel_checksum(work, degree)),
            None => {
                info!("Parallel loop skipped, no degree configured");
                None
            }
        };

        let tasks = if self.tasks {
            Some(run_tasks(TASK_COUNT, work)?)
        } else {
            info!("Task fan-out skipped");
            None
        };

        let simd = if self.simd {
            vector_add_demo(simd::capabilities())
        } else {
            info!("Vector add skipped");
            None
        };

        Ok(OptimizationReport {
            buffer,
            latency,
            parallel,
            tasks,
            simd,
        })
    }

    fn fill_buffer(&self, runtime: &Runtime) -> BenchResult<BufferFillOutcome> {
        let len = self.buffer_len;
        let checksum = if self.pooling {
            let mut region = runtime.pool().rent(len)?;
            fill_pattern(&mut region[..len]);
            byte_sum(&region[..len])
        } else {
            let mut buffer = runtime.heap().allocate(len)?;
            buffer.with_bytes_mut(fill_pattern);
            buffer.with_bytes(byte_sum)
        };

        info!(pooled = self.pooling, bytes = len, checksum, "Large buffer filled");
        Ok(BufferFillOutcome {
            pooled: self.pooling,
            bytes: len,
            checksum,
        })
    }

    fn latency_scope(&self, runtime: &Runtime) -> BenchResult<LatencyScopeOutcome> {
        let control = runtime.control();
        let previous = control.latency_mode();

        let inside = control.with_latency_mode(LatencyMode::SustainedLowLatency, || -> BenchResult<LatencyMode> {
            let _scratch = runtime.heap().allocate(LATENCY_SCOPE_ALLOCATION)?;
            std::thread::sleep(self.latency_work);
            Ok(control.latency_mode())
        })?;

        let restored = control.latency_mode();
        debug!(%previous, %inside, %restored, "Sustained low latency section done");
        Ok(LatencyScopeOutcome {
            previous,
            inside,
            restored,
        })
    }
}

impl Default for OptimizationWorkload {
    fn default() -> Self {
        Self::from_config(&Configuration::default())
    }
}

fn fill_pattern(bytes: &mut [u8]) {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (i % 256) as u8;
    }
}

fn byte_sum(bytes: &[u8]) -> u64 {
    bytes.iter().map(|&b| b as u64).sum()
}

#[inline]
fn square_mod(i: usize) -> u64 {
    (i as u64).wrapping_mul(i as u64) % 100
}

/// Sum of `i*i % 100` over `0..count` using at most `degree` worker threads
///
/// Workers claim chunks from a shared cursor; all of them are joined before
/// returning.
pub fn parallel_checksum(count: usize, degree: NonZeroUsize) -> ParallelOutcome {
    let cursor = AtomicUsize::new(0);
    let sum = AtomicU64::new(0);
    let workers = degree.get().min(count.div_ceil(PARALLEL_CHUNK).max(1));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let start = cursor.fetch_add(PARALLEL_CHUNK, Ordering::Relaxed);
                if start >= count {
                    break;
                }
                let end = (start + PARALLEL_CHUNK).min(count);
                let local: u64 = (start..end).map(square_mod).sum();
                sum.fetch_add(local, Ordering::Relaxed);
            });
        }
    });

    let checksum = sum.load(Ordering::SeqCst);
    info!(
        degree = degree.get(),
        workers,
        iterations = count,
        checksum,
        "Parallel loop done"
    );
    ParallelOutcome {
        degree: degree.get(),
        iterations: count,
        checksum,
    }
}

/// Spawn `task_count` tasks on a multi-thread runtime, each summing
/// `i*i % 100` over `0..work / task_count`, and await them all
pub fn run_tasks(task_count: usize, work: usize) -> BenchResult<TaskOutcome> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(task_count.max(1))
        .thread_name("bench-task")
        .build()
        .map_err(|e| BenchError::workload(format!("task runtime failed to start: {}", e)))?;

    let per_task = if task_count == 0 { 0 } else { work / task_count };
    let results = runtime.block_on(async {
        let handles: Vec<_> = (0..task_count)
            .map(|_| tokio::spawn(async move { (0..per_task).map(square_mod).sum::<u64>() }))
            .collect();
        join_all(handles).await
    });

    let mut checksum = 0u64;
    for result in results {
        checksum += result.map_err(|e| BenchError::workload(format!("task failed: {}", e)))?;
    }

    info!(tasks = task_count, checksum, "Task fan-out done");
    Ok(TaskOutcome {
        tasks: task_count,
        checksum,
    })
}

/// Add two `lanes * 1000` float arrays; `None` without vector hardware
pub fn vector_add_demo(caps: &SimdCapabilities) -> Option<SimdOutcome> {
    if !caps.is_hardware_accelerated() {
        info!("Vector add skipped, no hardware acceleration");
        return None;
    }

    let lanes = caps.f32_lanes();
    let elements = lanes * SIMD_VECTORS;
    let a: Vec<f32> = (0..elements).map(|i| i as f32 + 0.5).collect();
    let b: Vec<f32> = (0..elements).map(|i| i as f32 + 1.5).collect();
    let sum = simd::vector_add(&a, &b, lanes);
    let first = sum.first().copied().unwrap_or_default();

    info!(lanes, elements, first, "Vector add done");
    Some(SimdOutcome {
        lanes,
        elements,
        first,
        hardware_accelerated: true,
    })
}
