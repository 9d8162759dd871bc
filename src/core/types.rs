/*!
 * Core Types
 * Common types used across the harness
 */

/// Address type for raw memory regions
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Collector generation (0 = youngest, 2 = oldest)
pub type Generation = u8;
