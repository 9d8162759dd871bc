/*!
 * SIMD Capabilities
 * Detects available vector instruction sets and runs the vector-add workload
 */

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// SIMD capabilities available on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimdCapabilities {
    /// SSE2 support (x86/x86_64)
    pub sse2: bool,
    /// AVX2 support (x86/x86_64)
    pub avx2: bool,
    /// AVX-512 foundation support (x86/x86_64)
    pub avx512f: bool,
    /// NEON support (ARM)
    pub neon: bool,
}

impl SimdCapabilities {
    /// Widest vector register in bytes
    pub fn max_vector_bytes(&self) -> usize {
        if self.avx512f {
            64
        } else if self.avx2 {
            32
        } else if self.sse2 || self.neon {
            16
        } else {
            4
        }
    }

    /// f32 lanes per vector
    pub fn f32_lanes(&self) -> usize {
        self.max_vector_bytes() / std::mem::size_of::<f32>()
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.max_vector_bytes() > std::mem::size_of::<f32>()
    }
}

/// Detect available SIMD instruction sets
pub fn detect_simd_support() -> SimdCapabilities {
    #[cfg(target_arch = "x86_64")]
    {
        SimdCapabilities {
            sse2: is_x86_feature_detected!("sse2"),
            avx2: is_x86_feature_detected!("avx2"),
            avx512f: is_x86_feature_detected!("avx512f"),
            neon: false,
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        SimdCapabilities {
            sse2: false,
            avx2: false,
            avx512f: false,
            neon: std::arch::is_aarch64_feature_detected!("neon"),
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        SimdCapabilities {
            sse2: false,
            avx2: false,
            avx512f: false,
            neon: false,
        }
    }
}

static SIMD_CAPS: OnceLock<SimdCapabilities> = OnceLock::new();

/// Get SIMD capabilities, detecting them on first use
pub fn capabilities() -> &'static SimdCapabilities {
    SIMD_CAPS.get_or_init(|| {
        let caps = detect_simd_support();
        tracing::debug!(
            sse2 = caps.sse2,
            avx2 = caps.avx2,
            avx512f = caps.avx512f,
            neon = caps.neon,
            max_vector_bytes = caps.max_vector_bytes(),
            "SIMD capabilities detected"
        );
        caps
    })
}

/// Element-wise `a + b` in lane-sized chunks
///
/// Fixed-width chunks let the compiler keep each step in one register.
/// Inputs must be the same length; the output has that length.
pub fn vector_add(a: &[f32], b: &[f32], lanes: usize) -> Vec<f32> {
    debug_assert_eq!(a.len(), b.len());
    let lanes = lanes.max(1);
    let mut out = vec![0.0f32; a.len()];

    let mut out_chunks = out.chunks_exact_mut(lanes);
    let mut a_chunks = a.chunks_exact(lanes);
    let mut b_chunks = b.chunks_exact(lanes);
    for ((o, x), y) in (&mut out_chunks).zip(&mut a_chunks).zip(&mut b_chunks) {
        for i in 0..lanes {
            o[i] = x[i] + y[i];
        }
    }

    for ((o, x), y) in out_chunks
        .into_remainder()
        .iter_mut()
        .zip(a_chunks.remainder())
        .zip(b_chunks.remainder())
    {
        *o = x + y;
    }

    out
}
