/*!
 * External Heap
 *
 * Raw allocation facility for memory outside managed-heap tracking.
 * Regions are allocated zeroed through the global allocator, freed at most
 * once, and counted so a series can prove it did not leak.
 */

use super::external::{ExternalBuffer, ScopedBuffer};
use super::finalizer::Finalizer;
use super::types::{ExternalHeapStats, MemoryError, MemoryResult};
use crate::core::types::{Address, Size};
use parking_lot::Mutex;
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Who freed a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FreeReason {
    Explicit,
    Finalized,
}

#[derive(Debug, Default)]
pub(crate) struct HeapCounters {
    outstanding_regions: AtomicUsize,
    outstanding_bytes: AtomicUsize,
    pub(crate) pending_finalization: AtomicUsize,
    allocations: AtomicU64,
    explicit_releases: AtomicU64,
    finalizations: AtomicU64,
}

impl HeapCounters {
    /// Reserve budget for a new region; fails without side effects when over budget
    fn reserve(&self, size: Size, budget: Option<Size>) -> Result<(), Size> {
        let previous = self.outstanding_bytes.fetch_add(size, Ordering::SeqCst);
        if let Some(limit) = budget {
            if previous.saturating_add(size) > limit {
                self.outstanding_bytes.fetch_sub(size, Ordering::SeqCst);
                return Err(previous);
            }
        }
        Ok(())
    }

    fn unreserve(&self, size: Size) {
        self.outstanding_bytes.fetch_sub(size, Ordering::SeqCst);
    }

    fn record_alloc(&self) {
        self.outstanding_regions.fetch_add(1, Ordering::SeqCst);
        self.allocations.fetch_add(1, Ordering::SeqCst);
    }

    fn record_free(&self, size: Size, reason: FreeReason) {
        self.outstanding_regions.fetch_sub(1, Ordering::SeqCst);
        self.outstanding_bytes.fetch_sub(size, Ordering::SeqCst);
        match reason {
            FreeReason::Explicit => self.explicit_releases.fetch_add(1, Ordering::SeqCst),
            FreeReason::Finalized => self.finalizations.fetch_add(1, Ordering::SeqCst),
        };
    }

    fn snapshot(&self) -> ExternalHeapStats {
        ExternalHeapStats {
            outstanding_regions: self.outstanding_regions.load(Ordering::SeqCst),
            outstanding_bytes: self.outstanding_bytes.load(Ordering::SeqCst),
            pending_finalization: self.pending_finalization.load(Ordering::SeqCst),
            allocations: self.allocations.load(Ordering::SeqCst),
            explicit_releases: self.explicit_releases.load(Ordering::SeqCst),
            finalizations: self.finalizations.load(Ordering::SeqCst),
        }
    }
}

/// One raw allocation
///
/// The pointer lives in `slot`; taking it out of the slot is what frees the
/// region, so concurrent free attempts resolve to exactly one winner.
pub(crate) struct RawRegion {
    slot: Mutex<Option<NonNull<u8>>>,
    address: Address,
    layout: Layout,
    counters: Arc<HeapCounters>,
}

// SAFETY: the pointer is only dereferenced or freed while `slot` is locked.
unsafe impl Send for RawRegion {}
unsafe impl Sync for RawRegion {}

impl RawRegion {
    #[inline]
    pub(crate) fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub(crate) fn len(&self) -> Size {
        self.layout.size()
    }

    pub(crate) fn is_freed(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Run `f` on the live region; `None` once it has been freed
    pub(crate) fn with_ptr<R>(&self, f: impl FnOnce(NonNull<u8>, Size) -> R) -> Option<R> {
        let slot = self.slot.lock();
        slot.map(|ptr| f(ptr, self.layout.size()))
    }

    /// Free the region; returns `false` when someone else already did
    pub(crate) fn free(&self, reason: FreeReason) -> bool {
        let Some(ptr) = self.slot.lock().take() else {
            return false;
        };

        // SAFETY: `ptr` came from `alloc_zeroed(self.layout)` and has just been
        // removed from the slot, so no other caller can reach it.
        unsafe { alloc::dealloc(ptr.as_ptr(), self.layout) };
        self.counters.record_free(self.layout.size(), reason);
        trace!(
            address = format_args!("0x{:x}", self.address),
            size = self.layout.size(),
            reason = ?reason,
            "Raw region freed"
        );
        true
    }
}

impl Drop for RawRegion {
    fn drop(&mut self) {
        // Last handle gone without an explicit release or a finalizer pass
        self.free(FreeReason::Finalized);
    }
}

/// Raw memory facility with leak accounting and fallback finalization
#[derive(Clone)]
pub struct ExternalHeap {
    counters: Arc<HeapCounters>,
    budget: Option<Size>,
    finalizer: Finalizer,
}

impl ExternalHeap {
    /// Unbounded heap backed by the global allocator
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Heap that refuses to hold more than `budget` outstanding bytes
    ///
    /// Useful for reproducing allocation failures in tests.
    pub fn with_budget(budget: Size) -> Self {
        Self::build(Some(budget))
    }

    fn build(budget: Option<Size>) -> Self {
        let counters = Arc::new(HeapCounters::default());
        let finalizer = Finalizer::spawn(Arc::clone(&counters));
        debug!(budget = ?budget, "External heap initialized");
        Self {
            counters,
            budget,
            finalizer,
        }
    }

    pub(crate) fn allocate_region(&self, size: Size) -> MemoryResult<Arc<RawRegion>> {
        if size == 0 {
            return Err(MemoryError::AllocationFailure {
                requested: 0,
                reason: "zero-sized request".to_string(),
            });
        }

        if let Err(in_use) = self.counters.reserve(size, self.budget) {
            return Err(MemoryError::AllocationFailure {
                requested: size,
                reason: format!(
                    "external heap budget exhausted ({} of {} bytes in use)",
                    in_use,
                    self.budget.unwrap_or_default()
                ),
            });
        }

        let layout = match Layout::from_size_align(size, 1) {
            Ok(layout) => layout,
            Err(e) => {
                self.counters.unreserve(size);
                return Err(MemoryError::AllocationFailure {
                    requested: size,
                    reason: e.to_string(),
                });
            }
        };

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            self.counters.unreserve(size);
            return Err(MemoryError::AllocationFailure {
                requested: size,
                reason: "platform allocator returned null".to_string(),
            });
        };

        self.counters.record_alloc();
        let address = ptr.as_ptr() as Address;
        trace!(address = format_args!("0x{:x}", address), size, "Raw region allocated");

        Ok(Arc::new(RawRegion {
            slot: Mutex::new(Some(ptr)),
            address,
            layout,
            counters: Arc::clone(&self.counters),
        }))
    }

    /// Allocate a `width*height` buffer owned by the caller
    ///
    /// Dropping it without `release` hands it to the finalizer thread.
    pub fn allocate_buffer(&self, width: usize, height: usize) -> MemoryResult<ExternalBuffer> {
        ExternalBuffer::create(self, width, height)
    }

    /// Allocate a buffer that is released explicitly on every exit path
    pub fn scoped_buffer(&self, width: usize, height: usize) -> MemoryResult<ScopedBuffer> {
        self.allocate_buffer(width, height).map(ScopedBuffer::new)
    }

    #[inline]
    pub(crate) fn finalizer(&self) -> &Finalizer {
        &self.finalizer
    }

    pub fn stats(&self) -> ExternalHeapStats {
        self.counters.snapshot()
    }

    pub fn outstanding_regions(&self) -> usize {
        self.counters.outstanding_regions.load(Ordering::SeqCst)
    }

    pub fn pending_finalization(&self) -> usize {
        self.counters.pending_finalization.load(Ordering::SeqCst)
    }

    /// Block until every region queued for fallback cleanup before this call
    /// has been finalized
    pub fn wait_for_pending_finalizers(&self) {
        self.finalizer.drain();
    }
}

impl Default for ExternalHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExternalHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalHeap")
            .field("budget", &self.budget)
            .field("stats", &self.stats())
            .finish()
    }
}
