/*!
 * Managed Heap Tests
 * Generations, large-object heap and fragmentation accounting
 */

use lifetime_bench::core::limits::LARGE_OBJECT_THRESHOLD;
use lifetime_bench::runtime::{CollectionRequest, ManagedHeap, RuntimeCollector};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const NO_AUTO: usize = usize::MAX / 4;

#[test]
fn test_reachable_objects_survive_every_collection() {
    let heap = ManagedHeap::with_budgets(NO_AUTO, NO_AUTO);
    let small = heap.allocate(512).unwrap();
    let large = heap.allocate(LARGE_OBJECT_THRESHOLD).unwrap();

    for level in 0..=2 {
        let outcome = heap.collect(CollectionRequest::explicit(level, true, true));
        assert_eq!(outcome.freed_objects, 0);
    }
    assert_eq!(heap.total_memory(), 512 + LARGE_OBJECT_THRESHOLD);
    assert_eq!(small.len() + large.len(), heap.counters().total_memory);
}

#[test]
fn test_clones_keep_object_alive() {
    let heap = ManagedHeap::with_budgets(NO_AUTO, NO_AUTO);
    let buffer = heap.allocate(64).unwrap();
    let alias = buffer.clone();
    drop(buffer);

    heap.collect(CollectionRequest::explicit(2, true, false));
    assert_eq!(heap.total_memory(), 64);

    drop(alias);
    heap.collect(CollectionRequest::explicit(2, true, false));
    assert_eq!(heap.total_memory(), 0);
}

#[test]
fn test_threshold_boundary() {
    let heap = ManagedHeap::with_budgets(NO_AUTO, NO_AUTO);
    assert!(!heap.allocate(LARGE_OBJECT_THRESHOLD - 1).unwrap().is_large());
    assert!(heap.allocate(LARGE_OBJECT_THRESHOLD).unwrap().is_large());
}

#[test]
fn test_committed_includes_fragmentation() {
    let heap = ManagedHeap::with_budgets(NO_AUTO, NO_AUTO);
    drop(heap.allocate(200_000).unwrap());
    heap.collect(CollectionRequest::explicit(2, true, false));

    let counters = heap.counters();
    assert_eq!(counters.total_memory, 0);
    assert_eq!(counters.fragmented_bytes, 200_000);
    assert_eq!(counters.committed_bytes, 200_000);

    heap.collect(CollectionRequest::explicit(2, true, true));
    assert_eq!(heap.counters().committed_bytes, 0);
}

#[test]
fn test_escalation_reaches_gen1() {
    let heap = ManagedHeap::with_budgets(100, NO_AUTO);
    for _ in 0..20 {
        drop(heap.allocate(80).unwrap());
    }

    let counts = heap.counters().collection_counts;
    assert!(counts[0] >= 10);
    assert!(counts[1] >= 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_full_collection_leaves_only_live_bytes(
        sizes in proptest::collection::vec(1usize..200_000, 1..24),
        keep in proptest::collection::vec(any::<bool>(), 24),
    ) {
        let heap = ManagedHeap::with_budgets(NO_AUTO, NO_AUTO);
        let mut live = Vec::new();
        let mut live_bytes = 0;
        for (i, size) in sizes.iter().enumerate() {
            let buffer = heap.allocate(*size).unwrap();
            if keep[i] {
                live_bytes += size;
                live.push(buffer);
            }
        }

        let before = heap.total_memory();
        heap.collect(CollectionRequest::explicit(2, true, true));
        let after = heap.total_memory();

        prop_assert!(after <= before);
        prop_assert_eq!(after, live_bytes);
        prop_assert_eq!(heap.counters().fragmented_bytes, 0);
    }
}
