//! Randomized tests that drive a `BucketStorage` with long insert/erase sequences and compare
//! every observable property against a simple `Vec` model of the expected contents.
#![allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::integer_division,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]

use std::num::NonZero;
use std::ptr;

use bucket_storage::{BucketStorage, Cursor};
use new_zealand::nz;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// One live element as the model sees it: its value, where it was inserted and the address
/// it was given at insertion time.
struct Tracked {
    value: u64,
    cursor: Cursor<u64>,
    address: *const u64,
}

fn assert_matches_model(storage: &BucketStorage<u64>, model: &[Tracked], slab_capacity: usize) {
    assert_eq!(storage.len(), model.len());
    assert_eq!(storage.is_empty(), model.is_empty());
    assert_eq!(storage.capacity() % slab_capacity, 0);
    assert!(storage.capacity() >= storage.len());

    let expected: Vec<u64> = model.iter().map(|tracked| tracked.value).collect();
    let actual: Vec<u64> = storage.iter().copied().collect();
    assert_eq!(actual, expected);

    for tracked in model {
        let current = storage.get(tracked.cursor).unwrap();
        assert_eq!(*current, tracked.value);
        assert!(ptr::eq(current, tracked.address));
    }
}

fn run(seed: u64, slab_capacity: NonZero<usize>, steps: usize) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut storage = BucketStorage::with_slab_capacity(slab_capacity);

    // Kept in iteration order: appended on insert, removed in place on erase.
    let mut model: Vec<Tracked> = Vec::new();
    let mut next_value = 0_u64;

    for step in 0..steps {
        let insert = model.is_empty() || rng.random_bool(0.55);

        if insert {
            let cursor = storage.insert(next_value);
            let address = ptr::from_ref(storage.get(cursor).unwrap());

            model.push(Tracked {
                value: next_value,
                cursor,
                address,
            });

            next_value += 1;
        } else {
            let index = rng.random_range(0..model.len());
            let victim = model.remove(index);

            let expected_next = storage.next(victim.cursor).unwrap();
            let (value, following) = unsafe { storage.take(victim.cursor) }.unwrap();

            assert_eq!(value, victim.value);
            assert_eq!(following, expected_next);

            match model.get(index) {
                Some(successor) => assert_eq!(following, successor.cursor),
                None => assert_eq!(following, storage.end()),
            }
        }

        if step % 97 == 0 {
            assert_matches_model(&storage, &model, slab_capacity.get());
        }
    }

    assert_matches_model(&storage, &model, slab_capacity.get());

    // Compaction keeps values and order but hands out new addresses.
    let expected: Vec<u64> = model.iter().map(|tracked| tracked.value).collect();
    storage.shrink_to_fit();

    assert_eq!(storage.iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(
        storage.capacity(),
        storage.len().div_ceil(slab_capacity.get()) * slab_capacity.get()
    );

    // Drain everything through cursors, alternating between both ends.
    let mut from_front = true;
    while !storage.is_empty() {
        let cursor = if from_front {
            storage.begin()
        } else {
            storage.prev(storage.end()).unwrap()
        };

        unsafe { storage.erase(cursor) }.unwrap();
        from_front = !from_front;
    }

    assert_eq!(storage.capacity(), 0);
    assert_eq!(storage.begin(), storage.end());
}

#[test]
fn random_sequences_with_tiny_slabs() {
    for seed in 0..8 {
        run(seed, nz!(1), 600);
    }
}

#[test]
fn random_sequences_with_small_slabs() {
    for seed in 100..108 {
        run(seed, nz!(4), 2_000);
    }
}

#[test]
fn random_sequences_with_default_slabs() {
    run(0xB0C_4E7, bucket_storage::DEFAULT_SLAB_CAPACITY, 5_000);
}

#[test]
fn random_walks_agree_with_iteration() {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut storage = BucketStorage::with_slab_capacity(nz!(6));

    let mut cursors = Vec::new();
    for value in 0..200_u64 {
        cursors.push(storage.insert(value));

        if rng.random_bool(0.3) {
            let index = rng.random_range(0..cursors.len());
            let cursor = cursors.swap_remove(index);
            unsafe { storage.erase(cursor) }.unwrap();
        }
    }

    let in_order: Vec<u64> = storage.iter().copied().collect();

    for _ in 0..100 {
        let start = rng.random_range(0..in_order.len());
        let steps = rng.random_range(0..in_order.len() - start);

        let from = storage
            .advance_by(storage.begin(), isize::try_from(start).unwrap())
            .unwrap();
        let to = storage
            .advance_by(from, isize::try_from(steps).unwrap())
            .unwrap();

        assert_eq!(*storage.get(from).unwrap(), in_order[start]);
        assert_eq!(*storage.get(to).unwrap(), in_order[start + steps]);

        let back = storage
            .advance_by(to, -isize::try_from(steps).unwrap())
            .unwrap();
        assert_eq!(back, from);
    }
}
