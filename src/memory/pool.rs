/*!
 * Shared Buffer Pool
 * Reduces allocation pressure by reusing large byte regions across trials
 */

use super::types::{MemoryError, MemoryResult, PoolStats};
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::core::limits::{POOL_BUCKET_CAPACITY, POOL_MAX_BUCKET_SHIFT, POOL_MIN_BUCKET_SHIFT};
use crate::core::types::Size;
use crossbeam_queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::trace;

const BUCKET_COUNT: usize = (POOL_MAX_BUCKET_SHIFT - POOL_MIN_BUCKET_SHIFT + 1) as usize;

/// Bucket serving `size`, or `None` when it is too large to pool
fn bucket_index(size: Size) -> Option<usize> {
    let rounded = size.max(1 << POOL_MIN_BUCKET_SHIFT).checked_next_power_of_two()?;
    let shift = rounded.trailing_zeros();
    if shift > POOL_MAX_BUCKET_SHIFT {
        None
    } else {
        Some((shift - POOL_MIN_BUCKET_SHIFT) as usize)
    }
}

#[inline]
fn bucket_len(index: usize) -> Size {
    1 << (index as u32 + POOL_MIN_BUCKET_SHIFT)
}

/// Zero-initialised region, reporting allocator refusal instead of aborting
fn allocate_region(len: Size) -> MemoryResult<Vec<u8>> {
    let mut region = Vec::new();
    region
        .try_reserve_exact(len)
        .map_err(|e| MemoryError::AllocationFailure {
            requested: len,
            reason: e.to_string(),
        })?;
    region.resize(len, 0);
    Ok(region)
}

struct PoolInner {
    buckets: Vec<ArrayQueue<Vec<u8>>>,
    regions_created: AtomicU64,
    rents: AtomicU64,
    reuses: AtomicU64,
    outstanding: AtomicUsize,
    discarded: AtomicU64,
}

/// Thread-safe pool of byte regions bucketed by power-of-two size
///
/// Returned regions keep their contents; a rent may hand back a region
/// larger than requested that still holds a previous trial's bytes.
///
/// # Example
///
/// ```ignore
/// let pool = BufferPool::shared();
/// let mut region = pool.rent(512 * 512)?;
/// region.fill(128);
/// // Returned to the pool on drop
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create new pool with the default per-bucket retention
    pub fn new() -> Self {
        Self::with_bucket_capacity(POOL_BUCKET_CAPACITY)
    }

    /// Create new pool retaining at most `capacity` regions per bucket
    pub fn with_bucket_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                buckets: (0..BUCKET_COUNT).map(|_| ArrayQueue::new(capacity)).collect(),
                regions_created: AtomicU64::new(0),
                rents: AtomicU64::new(0),
                reuses: AtomicU64::new(0),
                outstanding: AtomicUsize::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Process-wide pool
    pub fn shared() -> &'static BufferPool {
        static SHARED: OnceLock<BufferPool> = OnceLock::new();
        SHARED.get_or_init(BufferPool::new)
    }

    /// Rent a region of at least `size` bytes
    pub fn rent(&self, size: Size) -> MemoryResult<PooledRegion> {
        let bucket = bucket_index(size);

        let region = match bucket {
            Some(index) => match self.inner.buckets[index].pop() {
                Some(region) => {
                    self.inner.reuses.fetch_add(1, Ordering::Relaxed);
                    region
                }
                None => {
                    let region = allocate_region(bucket_len(index))?;
                    self.inner.regions_created.fetch_add(1, Ordering::Relaxed);
                    region
                }
            },
            // Very large: don't pool
            None => {
                let region = allocate_region(size)?;
                self.inner.regions_created.fetch_add(1, Ordering::Relaxed);
                region
            }
        };

        self.inner.rents.fetch_add(1, Ordering::Relaxed);
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        trace!(requested = size, len = region.len(), bucket = ?bucket, "Pool region rented");

        Ok(PooledRegion {
            region: Some(region),
            bucket,
            requested: size,
            pool: self.clone(),
            metadata: GuardMetadata::new("pooled_region").with_size(size),
        })
    }

    fn give_back(&self, region: Vec<u8>, bucket: Option<usize>) {
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);

        let Some(index) = bucket else {
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        };

        if self.inner.buckets[index].push(region).is_err() {
            // Bucket full, let it drop
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            regions_created: self.inner.regions_created.load(Ordering::Relaxed),
            rents: self.inner.rents.load(Ordering::Relaxed),
            reuses: self.inner.reuses.load(Ordering::Relaxed),
            outstanding: self.inner.outstanding.load(Ordering::SeqCst),
            retained: self.inner.buckets.iter().map(ArrayQueue::len).sum(),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Rented region that auto-returns to its pool on drop
pub struct PooledRegion {
    region: Option<Vec<u8>>,
    bucket: Option<usize>,
    requested: Size,
    pool: BufferPool,
    metadata: GuardMetadata,
}

impl PooledRegion {
    /// Size asked for at rent time; the region itself may be larger
    #[inline]
    pub fn requested_len(&self) -> Size {
        self.requested
    }

    /// Start address of the region, stable across rent/return cycles
    #[inline]
    pub fn address(&self) -> usize {
        self.region.as_ref().map(|r| r.as_ptr() as usize).unwrap_or(0)
    }

    /// Write `value` into every byte of the whole region
    #[inline]
    pub fn fill(&mut self, value: u8) {
        self.as_mut_slice().fill(value);
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.region.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.region.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Deref for PooledRegion {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for PooledRegion {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl Guard for PooledRegion {
    fn resource_type(&self) -> &'static str {
        "pooled_region"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.region.is_some()
    }

    fn release(&mut self) -> GuardResult<()> {
        let region = self.region.take().ok_or(GuardError::AlreadyReleased {
            resource: self.resource_type(),
        })?;
        trace!(
            resource = self.resource_type(),
            bytes = self.metadata().size_bytes,
            held_us = self.metadata().lifetime_micros(),
            "Pooled region returned"
        );
        self.pool.give_back(region, self.bucket);
        Ok(())
    }
}

impl GuardDrop for PooledRegion {
    fn on_drop(&mut self) {
        if self.is_active() {
            let _ = self.release();
        }
    }
}

impl Drop for PooledRegion {
    fn drop(&mut self) {
        self.on_drop();
    }
}
