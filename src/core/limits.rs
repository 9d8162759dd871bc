/*!
 * Harness Limits and Constants
 *
 * Centralized location for defaults, thresholds and workload sizes.
 * Grouped by subsystem; values marked mirror the program the
 * benchmark scenarios were first written against.
 */

use std::time::Duration;

// =============================================================================
// TRIAL RUNNER
// =============================================================================

/// Repetitions per series
pub const DEFAULT_REPETITIONS: usize = 5;

/// Pause between two consecutive trials
/// Gives the finalizer thread and the collector room to settle
pub const DEFAULT_TRIAL_PAUSE: Duration = Duration::from_millis(2000);

// =============================================================================
// BITMAP WORKLOAD
// =============================================================================

/// Bitmap width in pixels, one byte per pixel
pub const BITMAP_WIDTH: usize = 512;

/// Bitmap height in pixels
pub const BITMAP_HEIGHT: usize = 512;

/// Strategy iterations per trial
pub const BITMAP_ITERATIONS: usize = 10;

/// Fill value for the HGlobal-style external mode and the managed paths
pub const PRIMARY_FILL_VALUE: u8 = 128;

/// Fill value for the CoTask-style external mode
pub const SECONDARY_FILL_VALUE: u8 = 64;

// =============================================================================
// MANAGED HEAP
// =============================================================================

/// Highest collector generation
pub const MAX_GENERATION: u8 = 2;

/// Objects at or above this size go to the large-object heap
pub const LARGE_OBJECT_THRESHOLD: usize = 85_000;

/// Small-object bytes allocated before an automatic gen0 collection
pub const DEFAULT_GEN0_BUDGET: usize = 8 * 1024 * 1024;

/// Large-object bytes allocated before an automatic gen2 collection
pub const DEFAULT_LOH_BUDGET: usize = 32 * 1024 * 1024;

/// Every Nth automatic collection escalates one generation
pub const GENERATION_ESCALATION_INTERVAL: u64 = 10;

// =============================================================================
// BUFFER POOL
// =============================================================================

/// Smallest pooled bucket is 2^4 = 16 bytes
pub const POOL_MIN_BUCKET_SHIFT: u32 = 4;

/// Largest pooled bucket is 2^30 = 1 GiB; bigger rentals are not pooled
pub const POOL_MAX_BUCKET_SHIFT: u32 = 30;

/// Regions retained per bucket
pub const POOL_BUCKET_CAPACITY: usize = 16;

// =============================================================================
// GC DEMO WORKLOAD
// =============================================================================

/// Large objects allocated per GC demo trial
pub const GC_DEMO_OBJECTS: usize = 20;

/// How long the demo stays inside the low-latency scope
pub const GC_DEMO_LATENCY_WORK: Duration = Duration::from_millis(100);

// =============================================================================
// OPTIMIZATION WORKLOAD
// =============================================================================

/// Buffer length for the pooling comparison
pub const OPTIMIZATION_BUFFER_LEN: usize = 10_000_000;

/// Small allocation performed inside the sustained-low-latency scope
pub const LATENCY_SCOPE_ALLOCATION: usize = 10 * 1024;

/// Simulated work inside the sustained-low-latency scope
pub const LATENCY_SCOPE_WORK: Duration = Duration::from_millis(50);

/// Independent tasks spawned by the task workload
pub const TASK_COUNT: usize = 4;

/// Work divisor shared by the parallel loop and task workloads
pub const WORK_DIVISOR: usize = 1000;

/// Indices claimed per parallel-loop worker step
pub const PARALLEL_CHUNK: usize = 256;

/// Vector-add length, in multiples of the lane count
pub const SIMD_VECTORS: usize = 1000;
