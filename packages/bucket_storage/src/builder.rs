use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{BucketStorage, DEFAULT_SLAB_CAPACITY, DropPolicy};

/// Builder for creating an instance of [`BucketStorage`].
///
/// Every setting is optional. Without any settings, the builder produces the same storage as
/// [`BucketStorage::new()`].
///
/// # Examples
///
/// ```
/// use bucket_storage::{BucketStorage, DropPolicy};
/// use new_zealand::nz;
///
/// let storage = BucketStorage::<String>::builder()
///     .slab_capacity(nz!(16))
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
///
/// assert_eq!(storage.slab_capacity().get(), 16);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct BucketStorageBuilder<T> {
    slab_capacity: NonZero<usize>,
    drop_policy: DropPolicy,

    _item: PhantomData<fn() -> T>,

    // Prevents Sync while allowing Send.
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> BucketStorageBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            slab_capacity: DEFAULT_SLAB_CAPACITY,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
            _not_sync: PhantomData,
        }
    }

    /// Sets how many elements each slab of the storage can hold.
    ///
    /// Larger slabs mean fewer allocations for large storages but more unused memory for small
    /// ones. The value stays fixed for the lifetime of the storage.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    /// use new_zealand::nz;
    ///
    /// let mut storage = BucketStorage::builder().slab_capacity(nz!(4)).build();
    /// storage.insert('a');
    ///
    /// assert_eq!(storage.capacity(), 4);
    /// ```
    pub fn slab_capacity(mut self, slab_capacity: NonZero<usize>) -> Self {
        self.slab_capacity = slab_capacity;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the storage. This governs how to treat remaining
    /// elements when the storage is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the storage with the specified configuration.
    ///
    /// No memory is allocated until the first element is inserted.
    #[must_use]
    pub fn build(self) -> BucketStorage<T> {
        BucketStorage::new_inner(self.slab_capacity, self.drop_policy)
    }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(BucketStorageBuilder<u32>: Send);
    assert_not_impl_any!(BucketStorageBuilder<u32>: Sync);

    #[test]
    fn defaults_match_new() {
        let built = BucketStorageBuilder::<u32>::new().build();
        let plain = BucketStorage::<u32>::new();

        assert_eq!(built.slab_capacity(), plain.slab_capacity());
        assert_eq!(built.slab_capacity(), DEFAULT_SLAB_CAPACITY);
        assert_eq!(built.capacity(), 0);
    }

    #[test]
    fn slab_capacity_is_applied() {
        let mut storage = BucketStorage::builder().slab_capacity(nz!(3)).build();

        for value in 0..4 {
            storage.insert(value);
        }

        assert_eq!(storage.slab_capacity(), nz!(3));
        assert_eq!(storage.capacity(), 6);
    }

    #[test]
    #[should_panic]
    fn must_not_drop_items_panics_when_dropped_non_empty() {
        let mut storage = BucketStorage::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        storage.insert(1);
    }

    #[test]
    fn must_not_drop_items_allows_dropping_empty() {
        let mut storage = BucketStorage::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        let cursor = storage.insert(1);

        // SAFETY: The cursor is live and not used afterwards.
        let (value, _) = unsafe { storage.take(cursor) }.expect("cursor is live");
        assert_eq!(value, 1);
    }
}
