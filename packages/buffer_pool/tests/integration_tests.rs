//! Integration tests for the rent/return contract shared by both pool variants.

use std::rc::Rc;

use buffer_pool::{
    BufferPool, DiagnosticBufferPool, Error, Pool, PoolMode, PoolProvider, PoolSet,
    SharedSlicePolicy, SlicePolicy, UninitSlicePolicy,
};

fn expected_length(minimum_length: usize, smallest: usize, largest: usize) -> usize {
    if minimum_length == 0 {
        0
    } else if minimum_length > largest {
        minimum_length
    } else {
        minimum_length.next_power_of_two().max(smallest)
    }
}

/// Rents and returns every length up to well past the largest class.
///
/// Unpooled rentals whose length is not a power of two can only be handed back to a pool that
/// tracks its rentals; other pools reject them like any foreign buffer.
fn check_round_trip<P>(pool: &mut P, smallest: usize, largest: usize, tracks_rentals: bool)
where
    P: Pool<Buffer = Box<[u8]>>,
{
    for minimum_length in (0..=600).chain([1023, 1024, 1025, 2048, 5000]) {
        let buffer = pool.rent(minimum_length);

        assert!(buffer.len() >= minimum_length);
        assert_eq!(
            buffer.len(),
            expected_length(minimum_length, smallest, largest),
            "rent({minimum_length})"
        );

        let length = buffer.len();
        let result = pool.give_back(buffer, false);

        if length > largest && !length.is_power_of_two() && !tracks_rentals {
            assert!(
                matches!(result, Err(Error::NotPooled { length: rejected }) if rejected == length),
                "give_back of {length} elements"
            );
        } else {
            result.unwrap();
        }
    }

    pool.detect_leaks().unwrap();
}

#[test]
fn round_trip_fast() {
    let mut pool = BufferPool::<SlicePolicy<u8>>::builder()
        .smallest_length(8)
        .size_classes(8)
        .build();

    check_round_trip(&mut pool, 8, 1024, false);
}

#[test]
fn round_trip_diagnostic() {
    let mut pool = DiagnosticBufferPool::<SlicePolicy<u8>>::builder()
        .smallest_length(8)
        .size_classes(8)
        .build_diagnostic();

    check_round_trip(&mut pool, 8, 1024, true);
    pool.assert_all_returned();
}

#[test]
fn reuse_is_last_in_first_out() {
    let mut pool = BufferPool::<UninitSlicePolicy<u128>>::new();

    let buffers: Vec<_> = (0..5).map(|_| pool.rent(300)).collect();
    let addresses: Vec<_> = buffers.iter().map(|b| b.as_ptr().addr()).collect();

    for buffer in buffers {
        pool.give_back(buffer, false).unwrap();
    }

    // Held until the end, so each rental pops the next buffer down the stack.
    let mut held = Vec::new();

    for expected in addresses.iter().rev() {
        let buffer = pool.rent(512);
        assert_eq!(buffer.as_ptr().addr(), *expected);
        held.push(buffer);
    }

    for buffer in held {
        pool.give_back(buffer, false).unwrap();
    }
    assert_eq!(pool.pooled_count(), 5);
}

#[test]
fn idle_trim_releases_buffers_and_later_rentals_start_fresh() {
    let mut pool = BufferPool::<SharedSlicePolicy<i32>>::new();

    let buffer = pool.rent(16);
    let alias = Rc::clone(&buffer);
    pool.give_back(buffer, false).unwrap();

    // The class saw a rental since the previous trim, so it is left alone.
    assert!(!pool.trim_excess());
    assert_eq!(pool.pooled_count(), 1);

    // Idle since then.
    assert!(pool.trim_excess());
    assert_eq!(pool.pooled_count(), 0);
    assert_eq!(Rc::strong_count(&alias), 1);

    let fresh = pool.rent(16);
    assert!(!Rc::ptr_eq(&fresh, &alias));
    pool.give_back(fresh, false).unwrap();

    // Renting made the class busy again.
    assert!(!pool.trim_excess());
    assert_eq!(pool.pooled_count(), 1);

    let reused = pool.rent(16);
    assert_eq!(Rc::strong_count(&reused), 1);
    pool.give_back(reused, false).unwrap();
}

#[test]
fn double_return_is_reported_by_diagnostic_pool_only() {
    let mut fast = BufferPool::<SharedSlicePolicy<i32>>::new();
    let buffer = fast.rent(16);
    let alias = Rc::clone(&buffer);
    fast.give_back(buffer, false).unwrap();
    fast.give_back(alias, false).unwrap();
    assert_eq!(fast.pooled_count(), 2);

    let mut diagnostic = DiagnosticBufferPool::<SharedSlicePolicy<i32>>::new();
    let buffer = diagnostic.rent(16);
    let alias = Rc::clone(&buffer);
    diagnostic.give_back(buffer, false).unwrap();

    let error = diagnostic.give_back(alias, false).unwrap_err();
    assert!(matches!(error, Error::AlreadyReturned { length: 16 }));
    assert!(error.to_string().contains("already been returned"));
}

#[test]
fn leaks_surface_only_when_asked() {
    let pools = PoolSet::builder()
        .smallest_length(4)
        .build_set(PoolMode::Diagnostic);

    let first = pools.rent::<String>(3);
    let second = pools.rent::<String>(3);
    pools.give_back(first, true).unwrap();
    drop(second);

    let Err(Error::Leaked { count, capture }) = pools.detect_leaks() else {
        panic!("the dropped rental must be reported");
    };
    assert_eq!(count, 1);

    // Without RUST_BACKTRACE the capture is a short placeholder, but it is always present.
    assert!(!capture.is_empty());
}

#[test]
fn providers_share_storage_through_rc() {
    let pools = Rc::new(PoolSet::new());
    let other_handle = Rc::clone(&pools);

    let buffer = PoolProvider::rent::<u32>(&pools, 40);
    let address = buffer.as_ptr().addr();
    PoolProvider::give_back(&pools, buffer, false).unwrap();

    let buffer = PoolProvider::rent::<u32>(&other_handle, 64);
    assert_eq!(buffer.as_ptr().addr(), address);
    PoolProvider::give_back(&other_handle, buffer, false).unwrap();
}
