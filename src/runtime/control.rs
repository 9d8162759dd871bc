/*!
 * Collector Control
 *
 * Thin harness-side wrapper over a `RuntimeCollector`: forced collections,
 * scoped latency-mode changes and memory readings.
 */

use super::traits::RuntimeCollector;
use super::types::{
    CollectionOutcome, CollectionRequest, CollectorError, CollectorSnapshot, LatencyMode,
    RuntimeCounters,
};
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::core::limits::MAX_GENERATION;
use crate::core::types::{Generation, Size};
use crate::memory::ExternalHeap;
use std::sync::Arc;
use tracing::{debug, info};

/// Collector control surface used by workloads
#[derive(Clone)]
pub struct CollectorControl {
    collector: Arc<dyn RuntimeCollector>,
    finalizers: Option<ExternalHeap>,
}

impl CollectorControl {
    pub fn new(collector: Arc<dyn RuntimeCollector>) -> Self {
        Self {
            collector,
            finalizers: None,
        }
    }

    /// Blocking collections also wait for this heap's finalizer queue
    pub fn with_finalizers(mut self, heap: ExternalHeap) -> Self {
        self.finalizers = Some(heap);
        self
    }

    pub fn latency_mode(&self) -> LatencyMode {
        self.collector.latency_mode()
    }

    /// Switch the latency mode until the returned guard drops
    ///
    /// Only one scope may be open per collector, across every control
    /// handle sharing it.
    pub fn enter_latency_mode(&self, mode: LatencyMode) -> Result<LatencyModeGuard, CollectorError> {
        if !self.collector.try_enter_latency_scope() {
            return Err(CollectorError::LatencyScopeActive {
                current: self.collector.latency_mode(),
            });
        }

        let previous = self.collector.latency_mode();
        self.collector.set_latency_mode(mode);
        debug!(%previous, %mode, "Latency mode scope entered");

        Ok(LatencyModeGuard {
            collector: Arc::clone(&self.collector),
            previous,
            active: true,
            metadata: GuardMetadata::new("latency_mode"),
        })
    }

    /// Run `body` with `mode` in effect, restoring the previous mode on every
    /// exit path (unwinding included)
    pub fn with_latency_mode<R, E>(
        &self,
        mode: LatencyMode,
        body: impl FnOnce() -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<CollectorError>,
    {
        let _scope = self.enter_latency_mode(mode)?;
        body()
    }

    /// Ask for a collection up to `level`
    ///
    /// Advisory. With `blocking`, pending external finalizers are drained
    /// before returning.
    pub fn request_collection(
        &self,
        level: Generation,
        blocking: bool,
        compacting: bool,
    ) -> CollectionOutcome {
        let request = CollectionRequest::explicit(level, blocking, compacting);
        let outcome = self.collector.collect(request);

        if blocking {
            if let Some(heap) = &self.finalizers {
                heap.wait_for_pending_finalizers();
            }
        }

        info!(
            level = request.generation,
            blocking,
            compacting,
            freed_bytes = outcome.freed_bytes,
            "Collection requested"
        );
        outcome
    }

    /// Current managed-memory estimate
    pub fn snapshot_memory(&self) -> Size {
        self.collector.total_memory()
    }

    /// Managed-memory reading after a full blocking collection
    pub fn snapshot_memory_full(&self) -> Size {
        self.request_collection(MAX_GENERATION, true, false);
        self.collector.total_memory()
    }

    /// Bracket `body` with memory readings
    pub fn measure<R, E>(
        &self,
        body: impl FnOnce() -> Result<R, E>,
    ) -> Result<(R, CollectorSnapshot), E> {
        let before_bytes = self.snapshot_memory();
        let value = body()?;
        let after_bytes = self.snapshot_memory();
        Ok((
            value,
            CollectorSnapshot {
                before_bytes,
                after_bytes,
            },
        ))
    }

    pub fn counters(&self) -> RuntimeCounters {
        self.collector.counters()
    }
}

impl std::fmt::Debug for CollectorControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorControl")
            .field("latency_mode", &self.latency_mode())
            .field("finalizers", &self.finalizers.is_some())
            .finish()
    }
}

/// Open latency-mode scope; restores the previous mode on release or drop
pub struct LatencyModeGuard {
    collector: Arc<dyn RuntimeCollector>,
    previous: LatencyMode,
    active: bool,
    metadata: GuardMetadata,
}

impl LatencyModeGuard {
    /// Mode that will be restored
    pub fn previous(&self) -> LatencyMode {
        self.previous
    }
}

impl Guard for LatencyModeGuard {
    fn resource_type(&self) -> &'static str {
        "latency_mode"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased {
                resource: "latency_mode",
            });
        }
        self.active = false;
        self.collector.set_latency_mode(self.previous);
        self.collector.leave_latency_scope();
        debug!(
            restored = %self.previous,
            held_us = self.metadata.lifetime_micros(),
            "Latency mode scope left"
        );
        Ok(())
    }
}

impl GuardDrop for LatencyModeGuard {
    fn on_drop(&mut self) {
        if self.active {
            let _ = self.release();
        }
    }
}

impl Drop for LatencyModeGuard {
    fn drop(&mut self) {
        self.on_drop();
    }
}
