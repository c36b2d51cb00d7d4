//! Basic usage example for `BucketStorage`.
//!
//! This example walks the storage with cursors, removes an element in the middle and shows
//! that the freed slot is reused without moving any of the remaining elements.

use std::ptr;

use bucket_storage::{BucketStorage, CursorError};
use new_zealand::nz;

fn main() {
    // Small slabs make the slab bookkeeping easy to follow.
    let mut storage = BucketStorage::with_slab_capacity(nz!(4));

    let names = ["alpha", "beta", "gamma", "delta", "epsilon"];
    let [_, beta, _, delta, _] = names.map(|name| storage.insert(name.to_string()));

    println!(
        "Inserted {} items, capacity is {} ({} per slab)",
        storage.len(),
        storage.capacity(),
        storage.slab_capacity()
    );

    // Remember where "delta" lives so we can check that it never moves.
    let delta_address = ptr::from_ref(storage.get(delta).expect("delta was just inserted"));

    // Walk forward from the first element to the end.
    let mut cursor = storage.begin();
    while cursor != storage.end() {
        let value = storage.get(cursor).expect("cursor is before end");
        println!("Visiting {value}");

        cursor = storage
            .next(cursor)
            .expect("stepping forward from a live element always succeeds");
    }

    // Erasing hands back the cursor of the following element.
    // SAFETY: The "beta" cursor is live and we do not use it again.
    let after_beta = unsafe { storage.erase(beta) }.expect("beta is a live element");
    println!(
        "Erased beta, next is {}",
        storage.get(after_beta).expect("gamma follows beta")
    );

    // The freed slot is refilled before any new slab is allocated, and the new element is
    // visited last.
    let zeta = storage.insert("zeta".to_string());
    println!("Inserted zeta, capacity is still {}", storage.capacity());

    let in_order: Vec<&str> = storage.iter().map(String::as_str).collect();
    println!("Iteration order: {in_order:?}");
    assert_eq!(in_order, ["alpha", "gamma", "delta", "epsilon", "zeta"]);

    // Stepping back from zeta lands on epsilon.
    let before_zeta = storage.prev(zeta).expect("zeta is not the first element");
    println!(
        "Before zeta is {}",
        storage.get(before_zeta).expect("epsilon is live")
    );

    // Nothing moved while we were removing and inserting around delta.
    assert!(ptr::eq(
        storage.get(delta).expect("delta is still live"),
        delta_address
    ));

    // Compaction moves every element, so old cursors are rejected afterwards.
    storage.shrink_to_fit();
    assert_eq!(storage.get(delta), Err(CursorError::InvalidCursor));
    println!(
        "After shrink_to_fit: {} items, capacity {}",
        storage.len(),
        storage.capacity()
    );
}
