//! Integration tests for the `bucket_storage` package.
//!
//! These exercise `BucketStorage` and `Cursor` through the public API only: address stability,
//! traversal order, cursor validation and the container-level operations.
#![allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::integer_division,
    clippy::modulo_arithmetic,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]

use std::collections::HashSet;
use std::{mem, ptr, thread};

use bucket_storage::{BucketStorage, Cursor, CursorError, DEFAULT_SLAB_CAPACITY, DropPolicy};
use new_zealand::nz;

fn collect<T: Clone>(storage: &BucketStorage<T>) -> Vec<T> {
    storage.iter().cloned().collect()
}

#[test]
fn empty_storage_shape() {
    let storage = BucketStorage::<String>::default();

    assert_eq!(storage.len(), 0);
    assert_eq!(storage.capacity(), 0);
    assert_eq!(storage.begin(), storage.end());
    assert!(storage.begin().is_end());
    assert_eq!(storage.slab_capacity(), DEFAULT_SLAB_CAPACITY);
}

#[test]
fn slab_scenario_with_four_per_slab() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(4));

    let cursors: Vec<_> = (1..=5).map(|value| storage.insert(value)).collect();
    assert_eq!(storage.len(), 5);
    assert_eq!(storage.capacity(), 8);

    unsafe { storage.erase(cursors[2]) }.unwrap();
    assert_eq!(storage.len(), 4);

    storage.insert(6);
    assert_eq!(storage.capacity(), 8);
    assert_eq!(collect(&storage), vec![1, 2, 4, 5, 6]);
}

#[test]
fn addresses_survive_unrelated_churn() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(8));

    let keepers: Vec<_> = (0..20).map(|value| storage.insert(value * 1000)).collect();
    let addresses: Vec<*const i32> = keepers
        .iter()
        .map(|cursor| ptr::from_ref(storage.get(*cursor).unwrap()))
        .collect();

    for round in 0..50 {
        let temporary: Vec<_> = (0..13).map(|offset| storage.insert(round + offset)).collect();

        for cursor in temporary.into_iter().rev() {
            unsafe { storage.erase(cursor) }.unwrap();
        }
    }

    for (cursor, address) in keepers.iter().zip(&addresses) {
        assert!(ptr::eq(storage.get(*cursor).unwrap(), *address));
    }

    assert_eq!(storage.len(), 20);
}

#[test]
fn traversal_counts_match_len() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(5));

    let cursors: Vec<_> = (0..37).map(|value| storage.insert(value)).collect();
    for cursor in cursors.iter().skip(3).step_by(4) {
        unsafe { storage.erase(*cursor) }.unwrap();
    }

    let mut forward = 0;
    let mut cursor = storage.begin();
    while cursor != storage.end() {
        forward += 1;
        cursor = storage.next(cursor).unwrap();
    }

    let mut backward = 0;
    let mut cursor = storage.end();
    while cursor != storage.begin() {
        backward += 1;
        cursor = storage.prev(cursor).unwrap();
    }

    assert_eq!(forward, storage.len());
    assert_eq!(backward, storage.len());
    assert_eq!(storage.iter().count(), storage.len());
}

#[test]
fn every_element_is_visited_once() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(3));

    let cursors: Vec<_> = (0..30).map(|value| storage.insert(value)).collect();
    for cursor in cursors.iter().step_by(3) {
        unsafe { storage.erase(*cursor) }.unwrap();
    }

    let seen: HashSet<i32> = storage.iter().copied().collect();
    assert_eq!(seen.len(), storage.len());
    assert!(seen.iter().all(|value| value % 3 != 0));
}

#[test]
fn erase_returns_what_next_would_have() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(2));

    let cursors: Vec<_> = (0..9).map(|value| storage.insert(value)).collect();

    for cursor in [cursors[4], cursors[0], cursors[8], cursors[5]] {
        let expected = storage.next(cursor).unwrap();
        let actual = unsafe { storage.erase(cursor) }.unwrap();
        assert_eq!(actual, expected);
    }

    assert_eq!(collect(&storage), vec![1, 2, 3, 6, 7]);
}

#[test]
fn capacity_is_multiple_of_slab_capacity() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(7));

    let mut cursors = Vec::new();

    for value in 0..50 {
        cursors.push(storage.insert(value));

        if value % 3 == 0 {
            let cursor = cursors.swap_remove(cursors.len() / 2);
            unsafe { storage.erase(cursor) }.unwrap();
        }

        assert_eq!(storage.capacity() % 7, 0);
        assert!(storage.capacity() >= storage.len());
    }
}

#[test]
fn shrink_to_fit_packs_tightly() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(4));

    let cursors: Vec<_> = (0..40).map(|value| storage.insert(value)).collect();
    for cursor in cursors.iter().step_by(3) {
        unsafe { storage.erase(*cursor) }.unwrap();
    }

    let before = collect(&storage);

    storage.shrink_to_fit();

    assert_eq!(collect(&storage), before);
    assert_eq!(storage.capacity(), storage.len().div_ceil(4) * 4);
    assert_eq!(storage.get(cursors[1]), Err(CursorError::InvalidCursor));
}

#[test]
fn clear_then_reuse() {
    let mut storage = BucketStorage::with_slab_capacity(nz!(4));
    storage.extend(["a", "b", "c", "d", "e"]);

    let stale = storage.begin();
    storage.clear();

    assert_eq!(storage.len(), 0);
    assert_eq!(storage.capacity(), 0);
    assert_eq!(storage.begin(), storage.end());
    assert_eq!(storage.get(stale), Err(CursorError::InvalidCursor));

    storage.extend(["x", "y"]);
    assert_eq!(collect(&storage), vec!["x", "y"]);
    assert_eq!(storage.capacity(), 4);
}

#[test]
fn default_cursor_errors() {
    let mut storage = BucketStorage::<u8>::new();
    storage.insert(1);

    let unbound = Cursor::<u8>::default();

    assert!(!unbound.is_bound());
    assert_eq!(storage.get(unbound), Err(CursorError::UninitializedCursor));
    assert_eq!(storage.next(unbound), Err(CursorError::UninitializedCursor));
    assert_eq!(storage.prev(unbound), Err(CursorError::UninitializedCursor));
    assert_eq!(
        storage.advance_by(unbound, 1),
        Err(CursorError::UninitializedCursor)
    );
    assert_eq!(
        unsafe { storage.take(unbound) }.map(|(value, _)| value),
        Err(CursorError::UninitializedCursor)
    );
}

#[test]
fn moved_storage_keeps_cursors_valid() {
    let mut storage = BucketStorage::new();
    let cursor = storage.insert(String::from("moved"));

    let moved = storage;
    assert_eq!(moved.get(cursor).unwrap(), "moved");

    let mut target = BucketStorage::new();
    let mut moved = moved;
    target.swap(&mut moved);

    assert_eq!(target.get(cursor).unwrap(), "moved");
    assert!(moved.is_empty());
}

#[test]
fn take_with_mem_take_leaves_empty_default() {
    let mut storage: BucketStorage<u32> = (0..3).collect();

    let taken = mem::take(&mut storage);

    assert!(storage.is_empty());
    assert_eq!(collect(&taken), vec![0, 1, 2]);
}

#[test]
fn must_not_drop_items_is_satisfied_by_draining() {
    let mut storage = BucketStorage::builder()
        .drop_policy(DropPolicy::MustNotDropItems)
        .build();

    storage.extend([1, 2, 3]);

    let drained: Vec<_> = storage.into_iter().collect();
    assert_eq!(drained, vec![1, 2, 3]);
}

#[test]
fn storage_can_move_between_threads() {
    let mut storage = BucketStorage::new();
    storage.extend([1_u64, 2, 3]);

    let sum = thread::spawn(move || storage.iter().sum::<u64>())
        .join()
        .unwrap();

    assert_eq!(sum, 6);
}
