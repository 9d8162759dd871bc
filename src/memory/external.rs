/*!
 * External Buffers
 *
 * Bitmap-shaped raw memory with explicit release. An owner that never
 * releases still gets its region reclaimed: dropping an active buffer
 * hands the region to the finalizer thread.
 */

use super::finalizer::Finalizer;
use super::raw::{ExternalHeap, FreeReason, RawRegion};
use super::types::{MemoryError, MemoryResult};
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::core::types::{Address, Size};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::trace;

/// Explicit-release raw buffer, one byte per pixel
///
/// # Example
///
/// ```ignore
/// let mut bitmap = heap.allocate_buffer(512, 512)?;
/// bitmap.fill(128)?;
/// bitmap.release()?;
/// ```
pub struct ExternalBuffer {
    region: Arc<RawRegion>,
    width: usize,
    height: usize,
    stride: usize,
    released: bool,
    finalizer: Finalizer,
    metadata: GuardMetadata,
}

impl ExternalBuffer {
    /// Allocate `width*height` zeroed bytes from `heap`
    pub fn create(heap: &ExternalHeap, width: usize, height: usize) -> MemoryResult<Self> {
        let size = buffer_size(width, height)?;
        let region = heap.allocate_region(size)?;

        Ok(Self {
            region,
            width,
            height,
            stride: width,
            released: false,
            finalizer: heap.finalizer().clone(),
            metadata: GuardMetadata::new("external_buffer").with_size(size),
        })
    }

    #[inline]
    pub fn address(&self) -> Address {
        self.region.address()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per row
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn len(&self) -> Size {
        self.region.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Write `value` into every byte
    pub fn fill(&mut self, value: u8) -> MemoryResult<()> {
        self.ensure_live()?;
        self.region
            .with_ptr(|ptr, len| {
                // SAFETY: region is live for the duration of the closure and `len` bytes long
                unsafe { std::ptr::write_bytes(ptr.as_ptr(), value, len) }
            })
            .ok_or(MemoryError::UseAfterRelease {
                address: self.address(),
            })
    }

    /// Read one byte
    pub fn byte_at(&self, offset: usize) -> MemoryResult<u8> {
        self.with_bytes(|bytes| bytes.get(offset).copied())?
            .ok_or(MemoryError::OutOfBounds {
                offset,
                len: self.len(),
            })
    }

    /// Borrow the contents for the duration of `f`
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> MemoryResult<R> {
        self.ensure_live()?;
        self.region
            .with_ptr(|ptr, len| {
                // SAFETY: region is live for the duration of the closure and `len` bytes long
                let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
                f(bytes)
            })
            .ok_or(MemoryError::UseAfterRelease {
                address: self.address(),
            })
    }

    /// Sum of all bytes
    pub fn checksum(&self) -> MemoryResult<u64> {
        self.with_bytes(|bytes| bytes.iter().map(|&b| b as u64).sum())
    }

    fn ensure_live(&self) -> MemoryResult<()> {
        if self.released {
            return Err(MemoryError::UseAfterRelease {
                address: self.address(),
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn region_handle(&self) -> Arc<RawRegion> {
        Arc::clone(&self.region)
    }
}

/// Byte length of a `width` x `height` buffer
///
/// Empty or overflowing dimensions cannot be satisfied by any allocator.
pub fn buffer_size(width: usize, height: usize) -> MemoryResult<Size> {
    if width == 0 || height == 0 {
        return Err(MemoryError::AllocationFailure {
            requested: 0,
            reason: format!("{}x{} buffer is empty", width, height),
        });
    }
    width
        .checked_mul(height)
        .ok_or_else(|| MemoryError::AllocationFailure {
            requested: Size::MAX,
            reason: format!("{}x{} overflows the address space", width, height),
        })
}

impl Guard for ExternalBuffer {
    fn resource_type(&self) -> &'static str {
        "external_buffer"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        !self.released
    }

    fn release(&mut self) -> GuardResult<()> {
        if self.released {
            return Err(GuardError::AlreadyReleased {
                resource: self.resource_type(),
            });
        }

        self.released = true;
        // `false` means the finalizer got there first; the region is gone either way
        let freed = self.region.free(FreeReason::Explicit);
        trace!(
            resource = self.resource_type(),
            address = format_args!("0x{:x}", self.address()),
            bytes = self.metadata().size_bytes,
            freed,
            lifetime_us = self.metadata().lifetime_micros(),
            "External buffer released"
        );
        Ok(())
    }
}

impl GuardDrop for ExternalBuffer {
    fn on_drop(&mut self) {
        if !self.released {
            self.released = true;
            trace!(
                resource = self.resource_type(),
                address = format_args!("0x{:x}", self.address()),
                bytes = self.metadata().size_bytes,
                "External buffer dropped unreleased, queued for finalization"
            );
            self.finalizer.enqueue(Arc::clone(&self.region));
        }
    }
}

impl Drop for ExternalBuffer {
    #[inline]
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl std::fmt::Debug for ExternalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalBuffer")
            .field("address", &format_args!("0x{:x}", self.address()))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("released", &self.released)
            .finish()
    }
}

/// External buffer released explicitly when it goes out of scope
///
/// Drop performs a regular release rather than deferring to the finalizer,
/// so early returns and panics still free the region deterministically.
pub struct ScopedBuffer {
    inner: ExternalBuffer,
}

impl ScopedBuffer {
    pub(crate) fn new(inner: ExternalBuffer) -> Self {
        Self { inner }
    }
}

impl Deref for ScopedBuffer {
    type Target = ExternalBuffer;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ScopedBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for ScopedBuffer {
    fn drop(&mut self) {
        if self.inner.is_active() {
            if let Err(e) = self.inner.release() {
                tracing::error!(error = %e, "Scoped buffer release failed");
            }
        }
    }
}
