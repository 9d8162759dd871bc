/*!
 * RAII Resource Guards
 *
 * Scoped resources with deterministic release on every exit path.
 *
 * ## Guard Types
 *
 * - **ExternalBuffer**: raw region, falls back to the finalizer when dropped unreleased
 * - **ScopedBuffer**: raw region released explicitly on drop
 * - **PooledRegion**: pooled bytes returned to the pool on drop
 * - **LatencyModeGuard**: collector latency mode restored on drop
 *
 * ## Example
 *
 * ```ignore
 * let mut buffer = heap.scoped_buffer(512, 512)?;
 * buffer.fill(128)?;
 * // Released on drop, even when the fill above fails
 * ```
 */

mod traits;

pub use traits::{Guard, GuardDrop};

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Use after release: {resource} already released")]
    AlreadyReleased { resource: &'static str },
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub size_bytes: usize,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            size_bytes: 0,
        }
    }

    #[inline]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size_bytes = size;
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
