/*!
 * Memory Module
 * Raw external buffers, fallback finalization and pooled regions
 */

pub mod external;
mod finalizer;
pub mod pool;
pub mod raw;
pub mod types;

// Re-export for convenience
pub use external::{buffer_size, ExternalBuffer, ScopedBuffer};
pub use pool::{BufferPool, PooledRegion};
pub use raw::ExternalHeap;
pub use types::*;
