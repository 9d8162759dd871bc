/*!
 * Memory Types
 * Common types for raw and pooled memory
 */

use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Allocation failure: requested {requested} bytes ({reason})")]
    AllocationFailure { requested: Size, reason: String },

    #[error("Use after release: region at 0x{address:x} was already released")]
    UseAfterRelease { address: Address },

    #[error("Offset {offset} out of bounds for {len}-byte region")]
    OutOfBounds { offset: usize, len: usize },
}

/// Raw (external) heap counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExternalHeapStats {
    /// Regions allocated and not yet freed
    pub outstanding_regions: usize,
    pub outstanding_bytes: Size,
    /// Dropped-unreleased regions waiting for the finalizer thread
    pub pending_finalization: usize,
    pub allocations: u64,
    /// Frees performed by an owner's explicit release
    pub explicit_releases: u64,
    /// Frees performed by fallback cleanup
    pub finalizations: u64,
}

impl ExternalHeapStats {
    /// Every allocation was freed exactly once
    pub fn is_balanced(&self) -> bool {
        self.outstanding_regions == 0
            && self.allocations == self.explicit_releases + self.finalizations
    }
}

/// Buffer pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolStats {
    /// Regions the pool had to allocate
    pub regions_created: u64,
    pub rents: u64,
    /// Rents served from a previously returned region
    pub reuses: u64,
    /// Rented and not yet returned
    pub outstanding: usize,
    /// Returned regions currently cached
    pub retained: usize,
    /// Returned regions dropped because their bucket was full or unpooled
    pub discarded: u64,
}

impl PoolStats {
    /// Fraction of rents served from the cache
    pub fn reuse_ratio(&self) -> f64 {
        if self.rents == 0 {
            0.0
        } else {
            self.reuses as f64 / self.rents as f64
        }
    }
}
