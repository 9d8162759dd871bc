/*!
 * Bitmap Workload
 * Allocate, fill and retire a bitmap-sized buffer repeatedly through one strategy
 */

use super::strategy::AllocationStrategy;
use crate::core::config::Configuration;
use crate::core::errors::BenchResult;
use crate::core::limits::{BITMAP_HEIGHT, BITMAP_ITERATIONS, BITMAP_WIDTH};
use crate::core::types::Generation;
use crate::memory::types::{ExternalHeapStats, PoolStats};
use crate::runtime::{CollectionOutcome, Runtime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What one run of the workload did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BitmapReport {
    pub strategy: AllocationStrategy,
    pub iterations: usize,
    pub bytes_per_iteration: usize,
    pub fill_value: u8,
    /// Present when a collection level is configured
    pub collection: Option<CollectionOutcome>,
    pub external: ExternalHeapStats,
    pub pool: PoolStats,
    pub managed_bytes: usize,
}

/// Bitmap processing workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapWorkload {
    pub width: usize,
    pub height: usize,
    pub iterations: usize,
    pub strategy: AllocationStrategy,
    pub fill_value: u8,
    pub collection_level: Option<Generation>,
}

impl BitmapWorkload {
    /// Default 512x512, ten iterations, strategy and fill taken from `config`
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            width: BITMAP_WIDTH,
            height: BITMAP_HEIGHT,
            iterations: BITMAP_ITERATIONS,
            strategy: config.strategy(),
            fill_value: config.fill_value(),
            collection_level: config.collection_trigger_level,
        }
    }

    pub fn with_dimensions(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn run(&self, runtime: &Runtime) -> BenchResult<BitmapReport> {
        debug!(
            width = self.width,
            height = self.height,
            iterations = self.iterations,
            strategy = %self.strategy,
            "Bitmap workload started"
        );

        for _ in 0..self.iterations {
            self.strategy
                .execute(runtime, self.width, self.height, self.fill_value)?;
        }

        let collection = self.collection_level.map(|level| {
            info!(level, "Forcing collection after bitmap workload");
            runtime.control().request_collection(level, true, false)
        });

        Ok(BitmapReport {
            strategy: self.strategy,
            iterations: self.iterations,
            bytes_per_iteration: self.width.saturating_mul(self.height),
            fill_value: self.fill_value,
            collection,
            external: runtime.external().stats(),
            pool: runtime.pool().stats(),
            managed_bytes: runtime.control().snapshot_memory(),
        })
    }
}

impl Default for BitmapWorkload {
    fn default() -> Self {
        Self::from_config(&Configuration::default())
    }
}
