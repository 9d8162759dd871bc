/*!
 * External Buffer Tests
 * Release semantics, fallback finalization and allocation failures
 */

use lifetime_bench::core::{Guard, GuardError};
use lifetime_bench::memory::{ExternalHeap, MemoryError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn test_fill_after_release_is_use_after_release() {
    let heap = ExternalHeap::new();
    let mut buffer = heap.allocate_buffer(512, 512).unwrap();
    buffer.fill(128).unwrap();
    buffer.release().unwrap();

    assert!(buffer.is_released());
    assert!(matches!(
        buffer.fill(1),
        Err(MemoryError::UseAfterRelease { .. })
    ));
    assert!(matches!(
        buffer.byte_at(0),
        Err(MemoryError::UseAfterRelease { .. })
    ));
}

#[test]
fn test_second_release_fails_without_double_free() {
    let heap = ExternalHeap::new();
    let mut buffer = heap.allocate_buffer(64, 64).unwrap();

    buffer.release().unwrap();
    assert_eq!(
        buffer.release(),
        Err(GuardError::AlreadyReleased {
            resource: "external_buffer"
        })
    );

    let stats = heap.stats();
    assert_eq!(stats.allocations, 1);
    assert_eq!(stats.explicit_releases, 1);
    assert_eq!(stats.outstanding_regions, 0);
}

#[test]
fn test_finalizer_does_not_touch_owned_buffers() {
    let heap = ExternalHeap::new();
    let mut buffer = heap.allocate_buffer(32, 32).unwrap();

    heap.wait_for_pending_finalizers();
    buffer.fill(5).unwrap();
    assert_eq!(buffer.checksum().unwrap(), 5 * 1024);
    assert_eq!(heap.stats().finalizations, 0);
}

#[test]
fn test_unreleased_buffers_reclaimed_after_wait() {
    let heap = ExternalHeap::new();
    for _ in 0..5 {
        let mut buffer = heap.allocate_buffer(512, 512).unwrap();
        buffer.fill(64).unwrap();
    }

    assert!(heap.pending_finalization() <= 5);
    heap.wait_for_pending_finalizers();

    let stats = heap.stats();
    assert_eq!(stats.outstanding_regions, 0);
    assert_eq!(stats.pending_finalization, 0);
    assert_eq!(stats.finalizations, 5);
    assert!(stats.is_balanced());
}

#[test]
fn test_buffers_released_from_many_threads() {
    let heap = Arc::new(ExternalHeap::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let heap = Arc::clone(&heap);
            std::thread::spawn(move || {
                for _ in 0..16 {
                    let mut buffer = heap.allocate_buffer(128, 128).unwrap();
                    buffer.fill(i as u8).unwrap();
                    if i % 2 == 0 {
                        buffer.release().unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    heap.wait_for_pending_finalizers();

    let stats = heap.stats();
    assert_eq!(stats.allocations, 128);
    assert_eq!(stats.explicit_releases, 64);
    assert_eq!(stats.finalizations, 64);
    assert!(stats.is_balanced());
}

#[test]
fn test_scoped_buffer_released_during_unwind() {
    let heap = ExternalHeap::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut buffer = heap.scoped_buffer(256, 256).unwrap();
        buffer.fill(1).unwrap();
        panic!("fill step failed");
    }));

    assert!(result.is_err());
    let stats = heap.stats();
    assert_eq!(stats.explicit_releases, 1);
    assert_eq!(stats.outstanding_regions, 0);
}

#[test]
fn test_budget_exhaustion_is_allocation_failure() {
    let heap = ExternalHeap::with_budget(512 * 512);
    let _held = heap.allocate_buffer(512, 512).unwrap();

    let second = heap.allocate_buffer(1, 1);
    assert!(matches!(
        second,
        Err(MemoryError::AllocationFailure { requested: 1, .. })
    ));
}

proptest! {
    #[test]
    fn prop_fill_writes_every_byte(width in 1usize..96, height in 1usize..96, value: u8) {
        let heap = ExternalHeap::new();
        let mut buffer = heap.allocate_buffer(width, height).unwrap();
        buffer.fill(value).unwrap();

        prop_assert_eq!(buffer.len(), width * height);
        prop_assert_eq!(buffer.checksum().unwrap(), value as u64 * (width * height) as u64);
        prop_assert_eq!(buffer.byte_at(width * height - 1).unwrap(), value);

        buffer.release().unwrap();
        prop_assert!(heap.stats().is_balanced());
    }
}
