/*!
 * Runtime Traits
 * The collector as seen by the harness
 */

use super::types::{CollectionOutcome, CollectionRequest, LatencyMode, RuntimeCounters};
use crate::core::types::Size;

/// Opaque collector service
///
/// Requests are advisory: an implementation may reclaim more or less than
/// asked. Callers only rely on counters being re-queryable afterwards.
#[cfg_attr(test, mockall::automock)]
pub trait RuntimeCollector: Send + Sync {
    /// Reclaim unreachable memory up to `request.generation`
    fn collect(&self, request: CollectionRequest) -> CollectionOutcome;

    /// Current process-wide latency mode
    fn latency_mode(&self) -> LatencyMode;

    /// Replace the process-wide latency mode
    fn set_latency_mode(&self, mode: LatencyMode);

    /// Claim the single latency-mode scope; `false` while one is open
    fn try_enter_latency_scope(&self) -> bool;

    /// Give back the claim taken by `try_enter_latency_scope`
    fn leave_latency_scope(&self);

    /// Current managed-memory usage estimate in bytes
    fn total_memory(&self) -> Size;

    /// Full counter set
    fn counters(&self) -> RuntimeCounters;
}
