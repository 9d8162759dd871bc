/*!
 * Runtime Types
 * Collector requests, outcomes, counters and latency modes
 */

use crate::core::limits::MAX_GENERATION;
use crate::core::types::{Generation, Size};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Collector errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("Latency mode scope already active (current mode {current})")]
    LatencyScopeActive { current: LatencyMode },
}

/// Collector latency mode, a single process-wide setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyMode {
    /// Throughput first, no concurrent collections
    Batch,
    /// Default balance between pauses and throughput
    Interactive,
    /// Short windows where full automatic collections are suppressed
    LowLatency,
    /// Long-running variant of `LowLatency`
    SustainedLowLatency,
}

impl LatencyMode {
    /// Oldest generation an automatic (budget-triggered) collection may reach
    pub fn max_automatic_generation(self) -> Generation {
        match self {
            LatencyMode::Batch | LatencyMode::Interactive => MAX_GENERATION,
            LatencyMode::LowLatency | LatencyMode::SustainedLowLatency => 1,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            LatencyMode::Batch => 0,
            LatencyMode::Interactive => 1,
            LatencyMode::LowLatency => 2,
            LatencyMode::SustainedLowLatency => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LatencyMode::Batch,
            2 => LatencyMode::LowLatency,
            3 => LatencyMode::SustainedLowLatency,
            _ => LatencyMode::Interactive,
        }
    }
}

impl Default for LatencyMode {
    fn default() -> Self {
        LatencyMode::Interactive
    }
}

impl std::fmt::Display for LatencyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LatencyMode::Batch => write!(f, "Batch"),
            LatencyMode::Interactive => write!(f, "Interactive"),
            LatencyMode::LowLatency => write!(f, "LowLatency"),
            LatencyMode::SustainedLowLatency => write!(f, "SustainedLowLatency"),
        }
    }
}

/// What brought a collection about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionTrigger {
    /// Requested by the harness
    Explicit,
    /// Allocation budget exceeded
    Budget,
}

/// A request for the collector to reclaim memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRequest {
    /// Oldest generation to collect; clamped to the oldest existing one
    pub generation: Generation,
    /// Wait for collection and pending finalizers before returning
    pub blocking: bool,
    /// Also compact the large-object heap
    pub compacting: bool,
    pub trigger: CollectionTrigger,
}

impl CollectionRequest {
    pub fn explicit(generation: Generation, blocking: bool, compacting: bool) -> Self {
        Self {
            generation: generation.min(MAX_GENERATION),
            blocking,
            compacting,
            trigger: CollectionTrigger::Explicit,
        }
    }

    pub(crate) fn automatic(generation: Generation) -> Self {
        Self {
            generation: generation.min(MAX_GENERATION),
            blocking: true,
            compacting: false,
            trigger: CollectionTrigger::Budget,
        }
    }
}

/// What a collection did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectionOutcome {
    pub generation: Generation,
    pub freed_bytes: Size,
    pub freed_objects: usize,
    pub promoted_objects: usize,
    pub compacted: bool,
    pub duration: Duration,
}

/// Collector counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeCounters {
    /// Bytes of objects not yet swept, reachable or not
    pub total_memory: Size,
    /// `total_memory` plus large-object fragmentation awaiting compaction
    pub committed_bytes: Size,
    pub fragmented_bytes: Size,
    pub tracked_objects: usize,
    /// Collections per generation; a gen-N collection counts for 0..=N
    pub collection_counts: [u64; 3],
    pub compactions: u64,
}

/// Memory readings bracketing one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectorSnapshot {
    pub before_bytes: Size,
    pub after_bytes: Size,
}

impl CollectorSnapshot {
    /// Signed growth across the bracketed operation
    pub fn delta(&self) -> i64 {
        self.after_bytes as i64 - self.before_bytes as i64
    }

    pub fn reclaimed(&self) -> Size {
        self.before_bytes.saturating_sub(self.after_bytes)
    }
}
