/*!
 * Guard Traits
 *
 * Core abstractions for RAII resource guards
 */

use super::{GuardMetadata, GuardResult};

/// Core guard trait
///
/// All guards must implement this to provide:
/// - Resource type identification
/// - Metadata access
/// - Manual release capability
pub trait Guard: Send {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    /// Get guard metadata
    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard is still active
    fn is_active(&self) -> bool;

    /// Manually release the resource
    ///
    /// Returns `Err` if already released; never releases twice
    fn release(&mut self) -> GuardResult<()>;
}

/// Guards that can be dropped with custom cleanup
///
/// Separates Drop logic for better testability
pub trait GuardDrop: Guard {
    /// Perform cleanup on drop
    ///
    /// # Panics
    ///
    /// Should NOT panic. Log errors instead.
    fn on_drop(&mut self);
}
