/*!
 * Runtime Context
 * Everything a workload touches, passed explicitly instead of living in globals
 */

use super::control::CollectorControl;
use super::heap::ManagedHeap;
use crate::core::types::Size;
use crate::memory::{BufferPool, ExternalHeap};
use std::sync::Arc;

/// Managed heap, external heap, shared pool and collector control
#[derive(Clone, Debug)]
pub struct Runtime {
    heap: ManagedHeap,
    external: ExternalHeap,
    pool: BufferPool,
    control: CollectorControl,
}

impl Runtime {
    pub fn new() -> Self {
        RuntimeBuilder::default().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    #[inline]
    pub fn heap(&self) -> &ManagedHeap {
        &self.heap
    }

    #[inline]
    pub fn external(&self) -> &ExternalHeap {
        &self.external
    }

    #[inline]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    #[inline]
    pub fn control(&self) -> &CollectorControl {
        &self.control
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Runtime`]
#[derive(Default)]
pub struct RuntimeBuilder {
    heap: Option<ManagedHeap>,
    external_budget: Option<Size>,
    pool: Option<BufferPool>,
}

impl RuntimeBuilder {
    pub fn with_heap(mut self, heap: ManagedHeap) -> Self {
        self.heap = Some(heap);
        self
    }

    /// Cap outstanding external bytes
    pub fn with_external_budget(mut self, budget: Size) -> Self {
        self.external_budget = Some(budget);
        self
    }

    /// Use a private pool instead of the process-wide one
    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Runtime {
        let heap = self.heap.unwrap_or_default();
        let external = match self.external_budget {
            Some(budget) => ExternalHeap::with_budget(budget),
            None => ExternalHeap::new(),
        };
        let pool = self.pool.unwrap_or_else(|| BufferPool::shared().clone());
        let control =
            CollectorControl::new(Arc::new(heap.clone())).with_finalizers(external.clone());

        Runtime {
            heap,
            external,
            pool,
            control,
        }
    }
}
