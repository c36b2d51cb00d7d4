/// Determines what happens when a [`BucketStorage`][crate::BucketStorage] that still holds
/// elements is dropped.
///
/// By default, the storage drops its remaining elements along with itself.
///
/// # Examples
///
/// ```
/// use bucket_storage::{BucketStorage, DropPolicy};
///
/// let storage = BucketStorage::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// Remaining elements are dropped together with the storage. This is the default.
    #[default]
    MayDropItems,

    /// The storage panics if it still contains elements when it is dropped.
    ///
    /// Useful when elements are referenced from elsewhere through their stable addresses and
    /// must be erased explicitly, after those references are gone.
    MustNotDropItems,
}
