/*!
 * GC Demo Workload
 *
 * Latency-mode scope, a burst of large-object allocations and a forced
 * compacting full collection, with managed-memory readings in between.
 */

use crate::core::errors::{BenchError, BenchResult};
use crate::core::limits::{
    GC_DEMO_LATENCY_WORK, GC_DEMO_OBJECTS, LARGE_OBJECT_THRESHOLD, MAX_GENERATION,
};
use crate::core::types::Size;
use crate::runtime::{
    CollectionOutcome, CollectorSnapshot, LatencyMode, Runtime, RuntimeCounters,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Managed-memory readings taken during one demo run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GcDemoReport {
    pub latency_mode_before: LatencyMode,
    pub latency_mode_after: LatencyMode,
    pub before: Size,
    pub after_alloc: Size,
    /// Reading after the forced collection, objects still referenced
    pub after_collection: Size,
    /// Reading after the objects were dropped and collected again
    pub after_release: Size,
    /// Bytes still held by the demo objects across the forced collection
    pub retained_bytes: Size,
    pub collection: CollectionOutcome,
    /// Bracket from `after_alloc` to `after_collection`
    pub snapshot: CollectorSnapshot,
    pub counters: RuntimeCounters,
}

impl GcDemoReport {
    /// Bytes the forced collection gave back
    pub fn reduction(&self) -> Size {
        self.snapshot.reclaimed()
    }
}

/// GC demo workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcDemo {
    pub objects: usize,
    pub base_size: Size,
    pub latency_work: Duration,
}

impl GcDemo {
    pub fn with_latency_work(mut self, work: Duration) -> Self {
        self.latency_work = work;
        self
    }

    pub fn with_objects(mut self, objects: usize) -> Self {
        self.objects = objects;
        self
    }

    pub fn run(&self, runtime: &Runtime) -> BenchResult<GcDemoReport> {
        let control = runtime.control();
        let latency_mode_before = control.latency_mode();

        control.with_latency_mode(LatencyMode::LowLatency, || {
            info!(mode = %control.latency_mode(), "Latency-sensitive section");
            std::thread::sleep(self.latency_work);
            Ok::<_, BenchError>(())
        })?;
        let latency_mode_after = control.latency_mode();

        let before = control.snapshot_memory();

        let objects = (0..self.objects)
            .map(|i| runtime.heap().allocate(self.base_size + i))
            .collect::<Result<Vec<_>, _>>()?;
        let after_alloc = control.snapshot_memory();
        info!(
            objects = objects.len(),
            before_kb = before / 1024,
            after_alloc_kb = after_alloc / 1024,
            "Large objects allocated"
        );

        let collection = control.request_collection(MAX_GENERATION, true, true);
        let after_collection = control.snapshot_memory_full();
        let snapshot = CollectorSnapshot {
            before_bytes: after_alloc,
            after_bytes: after_collection,
        };
        info!(
            after_collection_kb = after_collection / 1024,
            reduced_kb = snapshot.reclaimed() / 1024,
            "Compacting collection finished"
        );

        let retained_bytes: Size = objects.iter().map(|o| o.len()).sum();
        drop(objects);
        let after_release = control.snapshot_memory_full();

        Ok(GcDemoReport {
            latency_mode_before,
            latency_mode_after,
            before,
            after_alloc,
            after_collection,
            after_release,
            retained_bytes,
            collection,
            snapshot,
            counters: control.counters(),
        })
    }
}

impl Default for GcDemo {
    fn default() -> Self {
        Self {
            objects: GC_DEMO_OBJECTS,
            base_size: LARGE_OBJECT_THRESHOLD,
            latency_work: GC_DEMO_LATENCY_WORK,
        }
    }
}
