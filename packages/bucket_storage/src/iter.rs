use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::{BucketStorage, SlotDescriptor};

/// Walks `remaining` descriptors of a live-traversal chain from both ends.
///
/// The count alone decides when iteration is over, so the two ends never need to be compared
/// and the sentinel is never dereferenced.
struct ChainCursor<T> {
    front: NonNull<SlotDescriptor<T>>,
    back: Option<NonNull<SlotDescriptor<T>>>,
    remaining: usize,
}

impl<T> ChainCursor<T> {
    fn new(
        front: NonNull<SlotDescriptor<T>>,
        back: Option<NonNull<SlotDescriptor<T>>>,
        remaining: usize,
    ) -> Self {
        Self {
            front,
            back,
            remaining,
        }
    }

    /// # Safety
    ///
    /// The chain must not be modified while the cursor is in use.
    unsafe fn next_value(&mut self) -> Option<NonNull<T>> {
        self.remaining = self.remaining.checked_sub(1)?;

        // SAFETY: `remaining` was non-zero, so `front` is a live chain member.
        let descriptor = unsafe { self.front.as_ref() };

        if self.remaining > 0 {
            self.front = descriptor
                .next()
                .expect("every live descriptor is followed by another one or by the sentinel");
        }

        Some(descriptor.value().expect("live chain members are occupied"))
    }

    /// # Safety
    ///
    /// The chain must not be modified while the cursor is in use.
    unsafe fn next_back_value(&mut self) -> Option<NonNull<T>> {
        self.remaining = self.remaining.checked_sub(1)?;

        let back = self
            .back
            .expect("a non-empty chain always has a last member");

        // SAFETY: `remaining` was non-zero, so `back` is a live chain member.
        let descriptor = unsafe { back.as_ref() };

        self.back = descriptor.prev();

        Some(descriptor.value().expect("live chain members are occupied"))
    }
}

/// Iterator over shared references to the elements of a [`BucketStorage`], in iteration order.
///
/// Returned by [`BucketStorage::iter()`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, T> {
    chain: ChainCursor<T>,
    _storage: PhantomData<&'a BucketStorage<T>>,
}

impl<T> Iter<'_, T> {
    pub(crate) fn new(
        front: NonNull<SlotDescriptor<T>>,
        back: Option<NonNull<SlotDescriptor<T>>>,
        len: usize,
    ) -> Self {
        Self {
            chain: ChainCursor::new(front, back, len),
            _storage: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: The storage is borrowed for 'a, so the chain cannot change.
        let value = unsafe { self.chain.next_value() }?;

        // SAFETY: The value stays initialized and in place while the storage is borrowed.
        Some(unsafe { value.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chain.remaining, Some(self.chain.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        // SAFETY: The storage is borrowed for 'a, so the chain cannot change.
        let value = unsafe { self.chain.next_back_value() }?;

        // SAFETY: The value stays initialized and in place while the storage is borrowed.
        Some(unsafe { value.as_ref() })
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            chain: ChainCursor::new(self.chain.front, self.chain.back, self.chain.remaining),
            _storage: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("remaining", &self.chain.remaining)
            .finish_non_exhaustive()
    }
}

/// Iterator over exclusive references to the elements of a [`BucketStorage`], in iteration
/// order.
///
/// Returned by [`BucketStorage::iter_mut()`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IterMut<'a, T> {
    chain: ChainCursor<T>,
    _storage: PhantomData<&'a mut BucketStorage<T>>,
}

impl<T> IterMut<'_, T> {
    pub(crate) fn new(
        front: NonNull<SlotDescriptor<T>>,
        back: Option<NonNull<SlotDescriptor<T>>>,
        len: usize,
    ) -> Self {
        Self {
            chain: ChainCursor::new(front, back, len),
            _storage: PhantomData,
        }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: The storage is exclusively borrowed for 'a, so the chain cannot change.
        let mut value = unsafe { self.chain.next_value() }?;

        // SAFETY: Every element is yielded at most once, so the exclusive references never
        // overlap, and the storage is exclusively borrowed for 'a.
        Some(unsafe { value.as_mut() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chain.remaining, Some(self.chain.remaining))
    }
}

impl<T> DoubleEndedIterator for IterMut<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        // SAFETY: The storage is exclusively borrowed for 'a, so the chain cannot change.
        let mut value = unsafe { self.chain.next_back_value() }?;

        // SAFETY: Every element is yielded at most once, so the exclusive references never
        // overlap, and the storage is exclusively borrowed for 'a.
        Some(unsafe { value.as_mut() })
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

impl<T> FusedIterator for IterMut<'_, T> {}

impl<T> fmt::Debug for IterMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterMut")
            .field("remaining", &self.chain.remaining)
            .finish_non_exhaustive()
    }
}

/// Owning iterator that drains a [`BucketStorage`] in iteration order.
///
/// Elements not yet yielded are dropped together with the iterator, subject to the drop policy
/// of the storage.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoIter<T> {
    storage: BucketStorage<T>,
}

impl<T> IntoIter<T> {
    pub(crate) fn new(storage: BucketStorage<T>) -> Self {
        Self { storage }
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.storage.take_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.storage.len(), Some(self.storage.len()))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.storage.take_back()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> FusedIterator for IntoIter<T> {}

impl<T> fmt::Debug for IntoIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter")
            .field("remaining", &self.storage.len())
            .finish_non_exhaustive()
    }
}

// SAFETY: Same reasoning as for a shared reference to the storage.
unsafe impl<T: Sync> Send for Iter<'_, T> {}

// SAFETY: Same reasoning as for a shared reference to the storage.
unsafe impl<T: Sync> Sync for Iter<'_, T> {}

// SAFETY: Same reasoning as for an exclusive reference to the storage.
unsafe impl<T: Send> Send for IterMut<'_, T> {}

// SAFETY: Same reasoning as for an exclusive reference to the storage.
unsafe impl<T: Sync> Sync for IterMut<'_, T> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Iter<'static, u32>: Send, Sync, Clone, ExactSizeIterator, FusedIterator);
    assert_impl_all!(IterMut<'static, u32>: Send, Sync, ExactSizeIterator, FusedIterator);
    assert_impl_all!(IntoIter<u32>: Send, Sync, DoubleEndedIterator, FusedIterator);
    assert_not_impl_any!(Iter<'static, Cell<u32>>: Send, Sync);
    assert_not_impl_any!(IntoIter<Rc<u32>>: Send, Sync);

    fn fragmented() -> BucketStorage<u32> {
        let mut storage = BucketStorage::with_slab_capacity(nz!(3));

        let cursors: Vec<_> = (0..9).map(|value| storage.insert(value)).collect();

        for index in [1, 4, 5, 7] {
            unsafe { storage.erase(cursors[index]) }.unwrap();
        }

        // Lands in a reused slot but is visited last.
        storage.insert(9);

        storage
    }

    #[test]
    fn iter_follows_insertion_order() {
        let storage = fragmented();

        assert_eq!(
            storage.iter().copied().collect::<Vec<_>>(),
            vec![0, 2, 3, 6, 8, 9]
        );
        assert_eq!(storage.iter().len(), 6);
    }

    #[test]
    fn iter_from_both_ends_meets_in_the_middle() {
        let storage = fragmented();
        let mut iter = storage.iter();

        assert_eq!(iter.next(), Some(&0));
        assert_eq!(iter.next_back(), Some(&9));
        assert_eq!(iter.next_back(), Some(&8));
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next_back(), Some(&6));
        assert_eq!(iter.next(), Some(&3));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn iter_rev_matches_reversed_forward() {
        let storage = fragmented();

        let mut forward: Vec<_> = storage.iter().copied().collect();
        forward.reverse();

        assert_eq!(storage.iter().rev().copied().collect::<Vec<_>>(), forward);
    }

    #[test]
    fn iter_on_empty_storage() {
        let storage = BucketStorage::<u32>::new();

        assert_eq!(storage.iter().next(), None);
        assert_eq!(storage.iter().next_back(), None);
        assert_eq!(storage.iter().len(), 0);
    }

    #[test]
    fn iter_clone_is_independent() {
        let storage: BucketStorage<u32> = (0..4).collect();

        let mut original = storage.iter();
        original.next();

        let copy = original.clone();
        original.next();

        assert_eq!(copy.copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(original.copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn iter_mut_modifies_every_element() {
        let mut storage = fragmented();

        for value in &mut storage {
            *value *= 10;
        }

        assert_eq!(
            storage.iter().copied().collect::<Vec<_>>(),
            vec![0, 20, 30, 60, 80, 90]
        );
    }

    #[test]
    fn iter_mut_from_back() {
        let mut storage: BucketStorage<u32> = (0..3).collect();

        if let Some(last) = storage.iter_mut().next_back() {
            *last = 100;
        }

        assert_eq!(storage.iter().copied().collect::<Vec<_>>(), vec![0, 1, 100]);
    }

    #[test]
    fn into_iter_drains_in_order() {
        let storage = fragmented();

        let mut drain = storage.into_iter();
        assert_eq!(drain.len(), 6);
        assert_eq!(drain.next(), Some(0));
        assert_eq!(drain.next_back(), Some(9));
        assert_eq!(drain.collect::<Vec<_>>(), vec![2, 3, 6, 8]);
    }

    #[test]
    fn into_iter_drops_what_is_left() {
        struct Counted(Rc<Cell<usize>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));

        let storage: BucketStorage<_> = (0..4).map(|_| Counted(Rc::clone(&drops))).collect();

        let mut drain = storage.into_iter();
        drop(drain.next());
        assert_eq!(drops.get(), 1);

        drop(drain);
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn borrowed_into_iterator() {
        let storage: BucketStorage<u32> = (1..=3).collect();

        let mut sum = 0;
        for value in &storage {
            sum += value;
        }

        assert_eq!(sum, 6);
    }
}
