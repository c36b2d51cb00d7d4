//! A slab-backed container that keeps every element at a stable memory address for its entire
//! lifetime.
//!
//! This crate provides [`BucketStorage`], a container for workloads with frequent, interleaved
//! insertion and removal where elements must never move. A growable array relocates elements
//! when it grows; a linked list of individually allocated nodes pays for one allocation per
//! element. Bucket storage sits in between: elements live in fixed-capacity slabs, freed slots
//! are reused before any new slab is allocated and a slab is released once it becomes empty.
//!
//! # Key Features
//!
//! - **Stable memory addresses**: Elements never move while they are in the storage
//! - **O(1) insertion and removal**: Removal is by [`Cursor`], without searching
//! - **Bidirectional cursors**: O(1) single-step traversal in both directions
//! - **Slot reuse**: Freed slots are refilled before any new slab is allocated
//! - **Insertion-ordered iteration**: Elements are visited in the order they were inserted
//! - **Explicit compaction**: [`shrink_to_fit()`][BucketStorage::shrink_to_fit] packs the
//!   elements into as few slabs as possible
//! - **Flexible drop policies**: Configure behavior when the storage is dropped with remaining
//!   elements
//!
//! # Cursors
//!
//! Every insertion returns a [`Cursor`], a copyable position in the storage. Cursors do not
//! borrow the storage, so any number of them can be kept around while the storage is modified.
//! Element access and traversal go through the storage, which validates the cursor and reports
//! misuse as a [`CursorError`].
//!
//! Removing an element via a cursor is `unsafe` because the storage cannot detect all stale
//! copies of that cursor. See [`BucketStorage::erase()`] for the exact contract.
//!
//! # Examples
//!
//! ```
//! use bucket_storage::BucketStorage;
//! use new_zealand::nz;
//!
//! let mut storage = BucketStorage::with_slab_capacity(nz!(4));
//!
//! let cursors: Vec<_> = (1..=5).map(|value| storage.insert(value)).collect();
//! assert_eq!(storage.len(), 5);
//! assert_eq!(storage.capacity(), 8);
//!
//! // The cursor is live and is not used again.
//! unsafe { storage.erase(cursors[2]) }.unwrap();
//!
//! // The freed slot is reused, but the new element is visited last.
//! storage.insert(6);
//! assert_eq!(storage.capacity(), 8);
//! assert!(storage.iter().eq(&[1, 2, 4, 5, 6]));
//! ```
//!
//! Walking the storage with cursors:
//!
//! ```
//! use bucket_storage::BucketStorage;
//!
//! let storage: BucketStorage<char> = "abc".chars().collect();
//!
//! let mut cursor = storage.begin();
//! let mut visited = String::new();
//!
//! while cursor != storage.end() {
//!     visited.push(*storage.get(cursor).unwrap());
//!     cursor = storage.next(cursor).unwrap();
//! }
//!
//! assert_eq!(visited, "abc");
//! ```
//!
//! # Thread safety
//!
//! The storage has no internal synchronization. It is [`Send`] and [`Sync`] whenever its
//! elements are, so it can be moved to another thread or shared for reading. Cursors are
//! neither and stay on the thread that obtained them.

mod builder;
mod cursor;
mod drop_policy;
mod error;
mod iter;
mod owned_list;
mod slab;
mod slot;
mod storage;

pub use builder::*;
pub use cursor::Cursor;
pub use drop_policy::*;
pub use error::*;
pub use iter::{IntoIter, Iter, IterMut};
pub(crate) use owned_list::*;
pub(crate) use slab::*;
pub(crate) use slot::*;
pub use storage::{BucketStorage, DEFAULT_SLAB_CAPACITY};
