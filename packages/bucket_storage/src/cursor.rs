use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

use crate::{Slab, SlotDescriptor};

/// A bidirectional position in a [`BucketStorage`][crate::BucketStorage].
///
/// A cursor pairs the descriptor of one slot with the slab that owns that slot. It is a plain,
/// copyable handle: it does not borrow the storage and does not keep anything alive. All
/// operations on a cursor (dereferencing, stepping, erasing) go through the storage that issued
/// it, which validates the cursor as far as it cheaply can:
///
/// * An unbound cursor (from [`Cursor::default()`]) is rejected with
///   [`CursorError::UninitializedCursor`][crate::CursorError::UninitializedCursor].
/// * A cursor issued by another storage, or issued before the storage was cleared or
///   compacted, is rejected with [`CursorError::InvalidCursor`][crate::CursorError::InvalidCursor].
///
/// What the storage cannot detect is a cursor to an element that has since been erased. Using
/// such a cursor is prevented by the safety contract of
/// [`BucketStorage::erase()`][crate::BucketStorage::erase].
///
/// # Equality and ordering
///
/// Two cursors are equal when they refer to the same slot of the same storage.
///
/// Cursors of the same storage are also ordered, but that order is structural: first by the
/// creation order of the owning slab, then by the position of the slot within the slab. The end
/// cursor orders after every element. Because freed slots are reused and reinserted elements
/// are appended to the traversal order, this structural order need not match the order in which
/// [`next()`][crate::BucketStorage::next] visits elements. Cursors of different storages and
/// unbound cursors are not comparable with bound ones.
///
/// # Example
///
/// ```
/// use bucket_storage::BucketStorage;
///
/// let mut storage = BucketStorage::new();
/// let first = storage.insert("first");
/// let second = storage.insert("second");
///
/// assert_eq!(storage.next(first).unwrap(), second);
/// assert_eq!(storage.next(second).unwrap(), storage.end());
/// assert!(first < second);
/// ```
pub struct Cursor<T> {
    /// Identity of the storage (generation) that issued the cursor.
    storage_id: u64,

    /// `None` for an unbound cursor.
    slot: Option<NonNull<SlotDescriptor<T>>>,

    /// `None` for the end cursor and for an unbound cursor.
    slab: Option<NonNull<Slab<T>>>,

    /// Creation index of `slab`, cached for ordering without dereferencing anything.
    slab_index: u64,
}

/// Storage identities start at 1, so this never matches a real storage.
const UNBOUND_STORAGE_ID: u64 = 0;

/// Orders the end cursor after every slab.
const END_SLAB_INDEX: u64 = u64::MAX;

impl<T> Cursor<T> {
    #[must_use]
    pub(crate) fn element(
        storage_id: u64,
        slot: NonNull<SlotDescriptor<T>>,
        slab: NonNull<Slab<T>>,
        slab_index: u64,
    ) -> Self {
        Self {
            storage_id,
            slot: Some(slot),
            slab: Some(slab),
            slab_index,
        }
    }

    #[must_use]
    pub(crate) fn end(storage_id: u64, sentinel: NonNull<SlotDescriptor<T>>) -> Self {
        Self {
            storage_id,
            slot: Some(sentinel),
            slab: None,
            slab_index: END_SLAB_INDEX,
        }
    }

    /// Whether the cursor refers to a position in some storage (an element or the end).
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::{BucketStorage, Cursor};
    ///
    /// let storage = BucketStorage::<u8>::new();
    ///
    /// assert!(!Cursor::<u8>::default().is_bound());
    /// assert!(storage.end().is_bound());
    /// ```
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.slot.is_some()
    }

    /// Whether this is the end cursor of some storage.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let mut storage = BucketStorage::new();
    /// let cursor = storage.insert(1);
    ///
    /// assert!(!cursor.is_end());
    /// assert!(storage.end().is_end());
    /// ```
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.slot.is_some() && self.slab.is_none()
    }

    #[must_use]
    pub(crate) fn storage_id(&self) -> u64 {
        self.storage_id
    }

    #[must_use]
    pub(crate) fn slot(&self) -> Option<NonNull<SlotDescriptor<T>>> {
        self.slot
    }

    #[must_use]
    pub(crate) fn slab(&self) -> Option<NonNull<Slab<T>>> {
        self.slab
    }
}

impl<T> Default for Cursor<T> {
    /// Creates an unbound cursor that refers to nothing.
    fn default() -> Self {
        Self {
            storage_id: UNBOUND_STORAGE_ID,
            slot: None,
            slab: None,
            slab_index: 0,
        }
    }
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<T> {}

impl<T> PartialEq for Cursor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.storage_id == other.storage_id && self.slot == other.slot
    }
}

impl<T> Eq for Cursor<T> {}

impl<T> Hash for Cursor<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.storage_id.hash(state);
        self.slot.hash(state);
    }
}

impl<T> PartialOrd for Cursor<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.storage_id != other.storage_id {
            return None;
        }

        match (self.slot, other.slot) {
            (None, None) => Some(Ordering::Equal),
            (Some(a), Some(b)) => Some(
                self.slab_index
                    .cmp(&other.slab_index)
                    .then_with(|| a.as_ptr().addr().cmp(&b.as_ptr().addr())),
            ),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Cursor");

        if self.slot.is_none() {
            debug.field("bound", &false);
        } else if self.is_end() {
            debug.field("storage_id", &self.storage_id);
            debug.field("end", &true);
        } else {
            debug.field("storage_id", &self.storage_id);
            debug.field("slab_index", &self.slab_index);
            debug.field("slot", &self.slot);
        }

        debug.finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::collections::HashSet;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Cursor<u32>: Copy, Eq, Hash, fmt::Debug, Default);
    assert_not_impl_any!(Cursor<u32>: Send, Sync);

    fn descriptors() -> Box<[SlotDescriptor<u32>]> {
        (0..4).map(|_| SlotDescriptor::vacant()).collect()
    }

    #[test]
    fn default_is_unbound() {
        let cursor = Cursor::<u32>::default();

        assert!(!cursor.is_bound());
        assert!(!cursor.is_end());
        assert_eq!(cursor, Cursor::default());
        assert_eq!(
            cursor.partial_cmp(&Cursor::default()),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn end_is_bound_and_last() {
        let table = descriptors();
        let sentinel = SlotDescriptor::<u32>::vacant();

        let slab = NonNull::<Slab<u32>>::dangling();
        let element = Cursor::element(1, NonNull::from(&table[3]), slab, 5);
        let end = Cursor::end(1, NonNull::from(&sentinel));

        assert!(end.is_bound());
        assert!(end.is_end());
        assert!(element < end);
        assert_ne!(element, end);
    }

    #[test]
    fn ordering_is_by_slab_then_position() {
        let table = descriptors();
        let slab = NonNull::<Slab<u32>>::dangling();

        let early_slab_late_slot = Cursor::element(1, NonNull::from(&table[3]), slab, 0);
        let late_slab_early_slot = Cursor::element(1, NonNull::from(&table[0]), slab, 1);
        let late_slab_late_slot = Cursor::element(1, NonNull::from(&table[2]), slab, 1);

        assert!(early_slab_late_slot < late_slab_early_slot);
        assert!(late_slab_early_slot < late_slab_late_slot);
        assert!(late_slab_late_slot >= late_slab_early_slot);
        assert!(early_slab_late_slot <= early_slab_late_slot);
    }

    #[test]
    fn equality_is_by_slot_and_storage() {
        let table = descriptors();
        let slab = NonNull::<Slab<u32>>::dangling();

        let a = Cursor::element(1, NonNull::from(&table[1]), slab, 0);
        let same_slot = Cursor::element(1, NonNull::from(&table[1]), slab, 0);
        let other_storage = Cursor::element(2, NonNull::from(&table[1]), slab, 0);

        assert_eq!(a, same_slot);
        assert_ne!(a, other_storage);
        assert_eq!(a.partial_cmp(&other_storage), None);
    }

    #[test]
    fn unbound_is_incomparable_with_bound() {
        let table = descriptors();
        let slab = NonNull::<Slab<u32>>::dangling();

        let bound = Cursor::element(0, NonNull::from(&table[0]), slab, 0);
        let unbound = Cursor::<u32>::default();

        assert_eq!(bound.partial_cmp(&unbound), None);
        assert_eq!(unbound.partial_cmp(&bound), None);
    }

    #[test]
    fn hash_agrees_with_equality() {
        let table = descriptors();
        let slab = NonNull::<Slab<u32>>::dangling();

        let mut set = HashSet::new();
        set.insert(Cursor::element(1, NonNull::from(&table[0]), slab, 0));
        set.insert(Cursor::element(1, NonNull::from(&table[0]), slab, 0));
        set.insert(Cursor::element(1, NonNull::from(&table[1]), slab, 0));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn debug_distinguishes_kinds() {
        let sentinel = SlotDescriptor::<u32>::vacant();

        let unbound = format!("{:?}", Cursor::<u32>::default());
        assert!(unbound.contains("bound: false"));
        assert!(unbound.ends_with(", .. }"));

        let end = format!("{:?}", Cursor::end(3, NonNull::from(&sentinel)));
        assert!(end.contains("end: true"));
        assert!(end.ends_with(", .. }"));
    }
}
