/*!
 * Buffer Pool Tests
 * Rent/return reuse and outstanding-region accounting
 */

use lifetime_bench::core::Guard;
use lifetime_bench::memory::BufferPool;
use pretty_assertions::assert_eq;
use serial_test::serial;

#[test]
fn test_return_then_rent_does_not_grow() {
    let pool = BufferPool::new();

    for _ in 0..10 {
        let mut region = pool.rent(512 * 512).unwrap();
        region.fill(128);
    }

    let stats = pool.stats();
    assert_eq!(stats.regions_created, 1);
    assert_eq!(stats.rents, 10);
    assert_eq!(stats.reuses, 9);
    assert_eq!(stats.outstanding, 0);
}

#[test]
fn test_concurrent_rentals_create_separate_regions() {
    let pool = BufferPool::new();
    let a = pool.rent(1024).unwrap();
    let b = pool.rent(1024).unwrap();
    assert_ne!(a.address(), b.address());
    assert_eq!(pool.stats().outstanding, 2);
}

#[test]
fn test_released_region_is_retained() {
    let pool = BufferPool::new();
    let mut region = pool.rent(100).unwrap();
    assert!(region.len() >= 100);
    region.release().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.retained, 1);
    assert!(stats.reuse_ratio() == 0.0);
}

#[test]
fn test_rentals_from_many_threads() {
    let pool = BufferPool::new();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let mut region = pool.rent(4096).unwrap();
                    region.fill(3);
                }
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.rents, 200);
    assert_eq!(stats.outstanding, 0);
    assert!(stats.regions_created <= 4);
}

#[test]
#[serial]
fn test_shared_pool_is_one_instance() {
    let before = BufferPool::shared().stats().rents;
    drop(BufferPool::shared().rent(64).unwrap());
    assert_eq!(BufferPool::shared().stats().rents, before + 1);
}
