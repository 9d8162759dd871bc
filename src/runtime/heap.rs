/*!
 * Managed Heap
 *
 * Small generational heap standing in for a managed runtime's collector.
 *
 * ## Model
 *
 * - **Generations 0-2**: new small objects start in gen0, survivors of a
 *   collection are promoted one generation
 * - **Large-object heap**: objects of at least 85,000 bytes live in gen2 and
 *   are never promoted or moved
 * - **Garbage**: a buffer whose last handle dropped stays counted in
 *   `total_memory` until a collection that reaches its generation sweeps it
 * - **Fragmentation**: swept large objects leave holes in the committed
 *   counter until a compacting full collection
 * - **Budgets**: allocation volume triggers automatic collections, capped by
 *   the current latency mode
 */

use super::traits::RuntimeCollector;
use super::types::{CollectionOutcome, CollectionRequest, LatencyMode, RuntimeCounters};
use crate::core::limits::{
    DEFAULT_GEN0_BUDGET, DEFAULT_LOH_BUDGET, GENERATION_ESCALATION_INTERVAL,
    LARGE_OBJECT_THRESHOLD, MAX_GENERATION,
};
use crate::core::types::{Generation, Size};
use crate::memory::{MemoryError, MemoryResult};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

struct ManagedBlock {
    bytes: Mutex<Vec<u8>>,
}

struct ObjectEntry {
    block: Weak<ManagedBlock>,
    size: Size,
    generation: Generation,
    large: bool,
}

struct HeapState {
    objects: DashMap<u64, ObjectEntry, RandomState>,
    next_id: AtomicU64,
    total_bytes: AtomicUsize,
    fragmented_bytes: AtomicUsize,
    small_since_gc: AtomicUsize,
    large_since_gc: AtomicUsize,
    collection_counts: [AtomicU64; 3],
    compactions: AtomicU64,
    latency_mode: AtomicU8,
    latency_scope: AtomicBool,
    gen0_budget: Size,
    loh_budget: Size,
    // One collection at a time
    collecting: Mutex<()>,
}

/// Simulated managed heap with an explicit collector
#[derive(Clone)]
pub struct ManagedHeap {
    state: Arc<HeapState>,
}

impl ManagedHeap {
    pub fn new() -> Self {
        Self::with_budgets(DEFAULT_GEN0_BUDGET, DEFAULT_LOH_BUDGET)
    }

    /// Heap with custom automatic-collection budgets (useful for testing)
    pub fn with_budgets(gen0_budget: Size, loh_budget: Size) -> Self {
        debug!(gen0_budget, loh_budget, "Managed heap initialized");
        Self {
            state: Arc::new(HeapState {
                objects: DashMap::with_hasher(RandomState::new()),
                next_id: AtomicU64::new(1),
                total_bytes: AtomicUsize::new(0),
                fragmented_bytes: AtomicUsize::new(0),
                small_since_gc: AtomicUsize::new(0),
                large_since_gc: AtomicUsize::new(0),
                collection_counts: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
                compactions: AtomicU64::new(0),
                latency_mode: AtomicU8::new(LatencyMode::default().as_u8()),
                latency_scope: AtomicBool::new(false),
                gen0_budget,
                loh_budget,
                collecting: Mutex::new(()),
            }),
        }
    }

    /// Allocate a zeroed managed buffer
    ///
    /// May run an automatic collection first when the allocation budget of
    /// the target heap is exhausted.
    pub fn allocate(&self, len: Size) -> MemoryResult<ManagedBuffer> {
        self.maybe_collect_for(len);

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|e| MemoryError::AllocationFailure {
                requested: len,
                reason: e.to_string(),
            })?;
        bytes.resize(len, 0);

        let large = len >= LARGE_OBJECT_THRESHOLD;
        let block = Arc::new(ManagedBlock {
            bytes: Mutex::new(bytes),
        });
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);

        self.state.objects.insert(
            id,
            ObjectEntry {
                block: Arc::downgrade(&block),
                size: len,
                generation: if large { MAX_GENERATION } else { 0 },
                large,
            },
        );
        self.state.total_bytes.fetch_add(len, Ordering::SeqCst);
        if large {
            self.state.large_since_gc.fetch_add(len, Ordering::Relaxed);
        } else {
            self.state.small_since_gc.fetch_add(len, Ordering::Relaxed);
        }
        trace!(id, len, large, "Managed object allocated");

        Ok(ManagedBuffer { id, len, block })
    }

    fn maybe_collect_for(&self, len: Size) {
        let large = len >= LARGE_OBJECT_THRESHOLD;
        let over_budget = if large {
            self.state
                .large_since_gc
                .load(Ordering::Relaxed)
                .saturating_add(len)
                > self.state.loh_budget
        } else {
            self.state
                .small_since_gc
                .load(Ordering::Relaxed)
                .saturating_add(len)
                > self.state.gen0_budget
        };
        if !over_budget {
            return;
        }

        let wanted = if large {
            MAX_GENERATION
        } else {
            self.escalated_generation()
        };
        let generation = wanted.min(self.latency_mode().max_automatic_generation());
        debug!(wanted, generation, large, "Allocation budget exceeded, collecting");
        self.collect(CollectionRequest::automatic(generation));
    }

    /// Every tenth automatic collection reaches gen1, every hundredth gen2
    fn escalated_generation(&self) -> Generation {
        let next = self.state.collection_counts[0].load(Ordering::Relaxed) + 1;
        if next % (GENERATION_ESCALATION_INTERVAL * GENERATION_ESCALATION_INTERVAL) == 0 {
            2
        } else if next % GENERATION_ESCALATION_INTERVAL == 0 {
            1
        } else {
            0
        }
    }

    /// Collections performed so far that reached `generation`
    pub fn collection_count(&self, generation: Generation) -> u64 {
        self.state
            .collection_counts
            .get(generation as usize)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl RuntimeCollector for ManagedHeap {
    fn collect(&self, request: CollectionRequest) -> CollectionOutcome {
        let _exclusive = self.state.collecting.lock();
        let start = Instant::now();
        let generation = request.generation.min(MAX_GENERATION);

        let mut outcome = CollectionOutcome {
            generation,
            ..Default::default()
        };
        let mut large_freed: Size = 0;

        self.state.objects.retain(|_, entry| {
            if entry.generation > generation {
                return true;
            }
            if entry.block.strong_count() == 0 {
                outcome.freed_bytes += entry.size;
                outcome.freed_objects += 1;
                if entry.large {
                    large_freed += entry.size;
                }
                return false;
            }
            if !entry.large && entry.generation < MAX_GENERATION {
                entry.generation += 1;
                outcome.promoted_objects += 1;
            }
            true
        });

        self.state
            .total_bytes
            .fetch_sub(outcome.freed_bytes, Ordering::SeqCst);
        if large_freed > 0 {
            self.state
                .fragmented_bytes
                .fetch_add(large_freed, Ordering::SeqCst);
        }
        if request.compacting && generation == MAX_GENERATION {
            self.state.fragmented_bytes.store(0, Ordering::SeqCst);
            self.state.compactions.fetch_add(1, Ordering::SeqCst);
            outcome.compacted = true;
        }

        for counter in &self.state.collection_counts[..=generation as usize] {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        self.state.small_since_gc.store(0, Ordering::Relaxed);
        if generation == MAX_GENERATION {
            self.state.large_since_gc.store(0, Ordering::Relaxed);
        }

        outcome.duration = start.elapsed();
        debug!(
            generation,
            trigger = ?request.trigger,
            freed_bytes = outcome.freed_bytes,
            freed_objects = outcome.freed_objects,
            promoted = outcome.promoted_objects,
            compacted = outcome.compacted,
            duration_us = outcome.duration.as_micros() as u64,
            "Managed heap collection complete"
        );
        outcome
    }

    fn latency_mode(&self) -> LatencyMode {
        LatencyMode::from_u8(self.state.latency_mode.load(Ordering::SeqCst))
    }

    fn set_latency_mode(&self, mode: LatencyMode) {
        self.state.latency_mode.store(mode.as_u8(), Ordering::SeqCst);
    }

    fn try_enter_latency_scope(&self) -> bool {
        self.state
            .latency_scope
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn leave_latency_scope(&self) {
        self.state.latency_scope.store(false, Ordering::SeqCst);
    }

    fn total_memory(&self) -> Size {
        self.state.total_bytes.load(Ordering::SeqCst)
    }

    fn counters(&self) -> RuntimeCounters {
        let total_memory = self.total_memory();
        let fragmented_bytes = self.state.fragmented_bytes.load(Ordering::SeqCst);
        RuntimeCounters {
            total_memory,
            committed_bytes: total_memory + fragmented_bytes,
            fragmented_bytes,
            tracked_objects: self.state.objects.len(),
            collection_counts: [
                self.collection_count(0),
                self.collection_count(1),
                self.collection_count(2),
            ],
            compactions: self.state.compactions.load(Ordering::SeqCst),
        }
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManagedHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedHeap")
            .field("counters", &self.counters())
            .field("latency_mode", &self.latency_mode())
            .finish()
    }
}

/// Handle to a managed object
///
/// Clones share the object. It becomes garbage when the last clone drops;
/// the heap notices only at its next collection.
#[derive(Clone)]
pub struct ManagedBuffer {
    id: u64,
    len: Size,
    block: Arc<ManagedBlock>,
}

impl ManagedBuffer {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn len(&self) -> Size {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_large(&self) -> bool {
        self.len >= LARGE_OBJECT_THRESHOLD
    }

    pub fn fill(&mut self, value: u8) {
        self.block.bytes.lock().fill(value);
    }

    pub fn byte_at(&self, offset: usize) -> MemoryResult<u8> {
        self.block
            .bytes
            .lock()
            .get(offset)
            .copied()
            .ok_or(MemoryError::OutOfBounds {
                offset,
                len: self.len,
            })
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.block.bytes.lock())
    }

    pub fn with_bytes_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.block.bytes.lock())
    }
}

impl std::fmt::Debug for ManagedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBuffer")
            .field("id", &self.id)
            .field("len", &self.len)
            .finish()
    }
}
