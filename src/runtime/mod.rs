/*!
 * Runtime Module
 * Simulated managed runtime and the harness-side collector controls
 */

pub mod context;
pub mod control;
pub mod heap;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use context::{Runtime, RuntimeBuilder};
pub use control::{CollectorControl, LatencyModeGuard};
pub use heap::{ManagedBuffer, ManagedHeap};
pub use traits::RuntimeCollector;
pub use types::*;
