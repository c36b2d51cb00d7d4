use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicU64};
use std::thread;

use new_zealand::nz;
use tracing::debug;

use crate::{
    BucketStorageBuilder, Cursor, CursorError, DropPolicy, IntoIter, Iter, IterMut, OwnedList,
    Slab, SlotDescriptor,
};

/// Number of elements per slab used when no slab capacity is configured.
pub const DEFAULT_SLAB_CAPACITY: NonZero<usize> = nz!(64);

/// Zero is reserved for unbound cursors.
static STORAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A validated element position: its slot descriptor and the slab that owns it.
type LiveElement<T> = (NonNull<SlotDescriptor<T>>, NonNull<Slab<T>>);

fn next_storage_id() -> u64 {
    STORAGE_ID_COUNTER.fetch_add(1, atomic::Ordering::Relaxed)
}

/// A container that keeps every element at a stable memory address for its entire lifetime.
///
/// Insertion and removal through a [`Cursor`] are O(1), as is single-step traversal in either
/// direction.
///
/// Elements are stored in fixed-capacity slabs. Freed slots are reused before any new slab is
/// allocated, and a slab is released as soon as its last element is removed. Iteration follows
/// the order in which elements were inserted; an element inserted into a reused slot is visited
/// after all elements that were already present.
///
/// # Cursors
///
/// Insertion returns a [`Cursor`] to the new element. Cursors are cheap copyable positions that
/// can be used to read or modify an element, to step to its neighbors and to remove it. The
/// storage rejects cursors that it did not issue, as well as cursors issued before the storage
/// was last [cleared][Self::clear] or [compacted][Self::shrink_to_fit].
///
/// # Example
///
/// ```
/// use bucket_storage::BucketStorage;
///
/// let mut storage = BucketStorage::new();
///
/// let hello = storage.insert("hello".to_string());
/// storage.insert("world".to_string());
///
/// storage.get_mut(hello).unwrap().push('!');
///
/// let words: Vec<&str> = storage.iter().map(String::as_str).collect();
/// assert_eq!(words, ["hello!", "world"]);
/// ```
///
/// # Thread safety
///
/// The storage is thread-mobile ([`Send`]) if `T` is [`Send`] and can be shared between threads
/// ([`Sync`]) if `T` is [`Sync`]. Cursors are neither.
pub struct BucketStorage<T> {
    /// Identity of the current generation of this storage. Cursors carry the identity they were
    /// issued under.
    storage_id: u64,

    slab_capacity: NonZero<usize>,
    drop_policy: DropPolicy,

    /// Number of live elements.
    len: usize,

    /// Creation index for the next slab.
    next_creation_index: u64,

    /// Terminates the live-traversal chain and represents the end position. Its `prev` link is
    /// the last live element (or `None` if the storage is empty). Never holds a value.
    sentinel: NonNull<SlotDescriptor<T>>,

    /// The first live descriptor, or the sentinel if the storage is empty.
    front: NonNull<SlotDescriptor<T>>,

    /// Every live slab, in creation order.
    slabs: OwnedList<Slab<T>>,

    /// Slabs with at least one released slot on their local vacancy stack, used as a stack.
    vacancies: OwnedList<NonNull<Slab<T>>>,

    _owns: PhantomData<T>,
}

impl<T> BucketStorage<T> {
    /// Creates an empty storage with the default slab capacity of
    /// [`DEFAULT_SLAB_CAPACITY`] elements.
    ///
    /// No memory is allocated until the first element is inserted.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let storage = BucketStorage::<u64>::new();
    ///
    /// assert!(storage.is_empty());
    /// assert_eq!(storage.capacity(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an empty storage whose slabs each hold `slab_capacity` elements.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    /// use new_zealand::nz;
    ///
    /// let mut storage = BucketStorage::with_slab_capacity(nz!(8));
    /// storage.insert(1);
    ///
    /// assert_eq!(storage.capacity(), 8);
    /// ```
    #[must_use]
    pub fn with_slab_capacity(slab_capacity: NonZero<usize>) -> Self {
        Self::builder().slab_capacity(slab_capacity).build()
    }

    /// Creates a builder for configuring and constructing a [`BucketStorage`].
    pub fn builder() -> BucketStorageBuilder<T> {
        BucketStorageBuilder::new()
    }

    #[must_use]
    pub(crate) fn new_inner(slab_capacity: NonZero<usize>, drop_policy: DropPolicy) -> Self {
        let sentinel = NonNull::from(Box::leak(Box::new(SlotDescriptor::vacant())));

        Self {
            storage_id: next_storage_id(),
            slab_capacity,
            drop_policy,
            len: 0,
            next_creation_index: 0,
            sentinel,
            front: sentinel,
            slabs: OwnedList::new(),
            vacancies: OwnedList::new(),
            _owns: PhantomData,
        }
    }

    /// The number of elements in the storage.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the storage holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of elements the storage can hold without allocating another slab.
    ///
    /// This is always a multiple of [`slab_capacity()`][Self::slab_capacity] and never less than
    /// [`len()`][Self::len].
    #[must_use]
    pub fn capacity(&self) -> usize {
        // Cannot overflow because every slot of every slab exists in memory.
        self.slabs.len().wrapping_mul(self.slab_capacity.get())
    }

    /// The number of elements each slab of this storage holds.
    #[must_use]
    pub fn slab_capacity(&self) -> NonZero<usize> {
        self.slab_capacity
    }

    /// The drop policy of the storage.
    #[must_use]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// Inserts a value and returns a cursor to it.
    ///
    /// The value is placed into a previously freed slot if one exists, otherwise into a
    /// never-used slot, allocating a new slab only when every slab is full. Regardless of the
    /// slot it lands in, the new element becomes the last element in iteration order.
    ///
    /// The value will not move in memory until it is removed from the storage.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let mut storage = BucketStorage::new();
    /// let cursor = storage.insert(42);
    ///
    /// assert_eq!(*storage.get(cursor).unwrap(), 42);
    /// ```
    pub fn insert(&mut self, value: T) -> Cursor<T> {
        if self.len == self.capacity() {
            self.add_slab();
        }

        let mut slab_ptr = match self.vacancies.back() {
            // SAFETY: The handle was just obtained from the list, so the node is live.
            Some(entry) => *unsafe { self.vacancies.get(entry) },
            None => {
                let newest = self
                    .slabs
                    .back()
                    .expect("there is at least one slab because we add one when full");

                // SAFETY: The handle was just obtained from the list, so the node is live.
                unsafe { self.slabs.value_ptr(newest) }
            }
        };

        // SAFETY: Slabs are owned by the registry and we hold `&mut self`, so nothing else
        // can be accessing this slab right now.
        let slab = unsafe { slab_ptr.as_mut() };

        debug_assert!(slab.has_vacancy());

        let descriptor = slab.insert(value);

        if slab.released_slots() == 0 {
            if let Some(entry) = slab.take_vacancy_entry() {
                // SAFETY: The slab held a released slot until now, so it was on the vacancy
                // stack and the entry is live.
                unsafe {
                    self.vacancies.erase(entry);
                }
            }
        }

        let creation_index = slab.creation_index();

        #[cfg(debug_assertions)]
        slab.integrity_check();

        self.link_last(descriptor);

        // Cannot overflow because every element occupies a slot in memory.
        self.len = self.len.wrapping_add(1);

        Cursor::element(self.storage_id, descriptor, slab_ptr, creation_index)
    }

    /// Inserts a clone of `value` and returns a cursor to it.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let template = vec![1, 2, 3];
    ///
    /// let mut storage = BucketStorage::new();
    /// let a = storage.insert_cloned(&template);
    /// let b = storage.insert_cloned(&template);
    ///
    /// assert_eq!(storage.get(a).unwrap(), storage.get(b).unwrap());
    /// ```
    pub fn insert_cloned(&mut self, value: &T) -> Cursor<T>
    where
        T: Clone,
    {
        self.insert(value.clone())
    }

    /// Removes and drops the element the cursor points to.
    ///
    /// Returns a cursor to the element that followed the removed one in iteration order, or the
    /// [end cursor][Self::end] if the removed element was the last one.
    ///
    /// If this was the last element of its slab, the slab is released.
    ///
    /// # Errors
    ///
    /// * [`CursorError::UninitializedCursor`] if the cursor is unbound.
    /// * [`CursorError::InvalidCursor`] if the cursor is the end cursor, was issued by another
    ///   storage or was issued before the storage was last cleared or compacted.
    ///
    /// The storage is unchanged when an error is returned.
    ///
    /// # Safety
    ///
    /// The cursor must not refer to an element that has already been removed from this storage.
    /// After this call, no copy of `cursor` may be used with the storage again.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let mut storage = BucketStorage::new();
    /// let first = storage.insert(1);
    /// let second = storage.insert(2);
    ///
    /// // SAFETY: `first` is live and we do not use it after this.
    /// let following = unsafe { storage.erase(first) }.unwrap();
    ///
    /// assert_eq!(following, second);
    /// assert_eq!(storage.len(), 1);
    /// ```
    pub unsafe fn erase(&mut self, cursor: Cursor<T>) -> Result<Cursor<T>, CursorError> {
        // SAFETY: Forwarding the caller's guarantees.
        let (value, following) = unsafe { self.take(cursor) }?;

        drop(value);

        Ok(following)
    }

    /// Removes the element the cursor points to and returns it, together with a cursor to the
    /// element that followed it in iteration order (or the [end cursor][Self::end]).
    ///
    /// # Errors
    ///
    /// Same as [`erase()`][Self::erase].
    ///
    /// # Safety
    ///
    /// Same as [`erase()`][Self::erase].
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let mut storage = BucketStorage::new();
    /// let cursor = storage.insert("only".to_string());
    ///
    /// // SAFETY: `cursor` is live and we do not use it after this.
    /// let (value, following) = unsafe { storage.take(cursor) }.unwrap();
    ///
    /// assert_eq!(value, "only");
    /// assert_eq!(following, storage.end());
    /// ```
    pub unsafe fn take(&mut self, cursor: Cursor<T>) -> Result<(T, Cursor<T>), CursorError> {
        let (descriptor, mut slab_ptr) = self.live_element(cursor)?;

        // SAFETY: The caller guarantees the cursor is not dangling, so its slab is still in
        // the registry, and we hold `&mut self`.
        let slab = unsafe { slab_ptr.as_mut() };

        let successor = self.unlink(descriptor);
        let value = slab.release_slot(descriptor);

        // The slab just went from zero released slots to one.
        if slab.released_slots() == 1 {
            let entry = self.vacancies.push_back(slab_ptr);
            slab.set_vacancy_entry(entry);
        }

        #[cfg(debug_assertions)]
        slab.integrity_check();

        let retire = slab.is_empty();

        self.len = self
            .len
            .checked_sub(1)
            .expect("we just removed a live element so the count must be non-zero");

        let following = self.cursor_at(successor, Some(slab_ptr));

        if retire {
            self.retire_slab(slab_ptr);
        }

        Ok((value, following))
    }

    /// Returns a reference to the element the cursor points to.
    ///
    /// # Errors
    ///
    /// * [`CursorError::UninitializedCursor`] if the cursor is unbound.
    /// * [`CursorError::InvalidCursor`] if the cursor is the end cursor, was issued by another
    ///   storage or was issued before the storage was last cleared or compacted.
    pub fn get(&self, cursor: Cursor<T>) -> Result<&T, CursorError> {
        let (descriptor, _) = self.live_element(cursor)?;

        // SAFETY: live_element() only returns occupied descriptors of this storage.
        let value = unsafe { descriptor.as_ref() }
            .value()
            .expect("live_element() only returns occupied descriptors");

        // SAFETY: The value stays initialized and in place while the storage is borrowed.
        Ok(unsafe { value.as_ref() })
    }

    /// Returns an exclusive reference to the element the cursor points to.
    ///
    /// # Errors
    ///
    /// Same as [`get()`][Self::get].
    pub fn get_mut(&mut self, cursor: Cursor<T>) -> Result<&mut T, CursorError> {
        let (descriptor, _) = self.live_element(cursor)?;

        // SAFETY: live_element() only returns occupied descriptors of this storage.
        let mut value = unsafe { descriptor.as_ref() }
            .value()
            .expect("live_element() only returns occupied descriptors");

        // SAFETY: The value stays initialized and in place while the storage is exclusively
        // borrowed, which also guarantees nobody else holds a reference to it.
        Ok(unsafe { value.as_mut() })
    }

    /// Returns a cursor to the first element in iteration order, or the
    /// [end cursor][Self::end] if the storage is empty.
    #[must_use]
    pub fn begin(&self) -> Cursor<T> {
        self.cursor_at(self.front, None)
    }

    /// Returns the end cursor, the position after the last element.
    ///
    /// The end cursor does not refer to an element. Stepping back from it yields the last
    /// element.
    #[must_use]
    pub fn end(&self) -> Cursor<T> {
        Cursor::end(self.storage_id, self.sentinel)
    }

    /// Returns a cursor to the element after the one `cursor` points to, or the
    /// [end cursor][Self::end] if `cursor` points to the last element.
    ///
    /// # Errors
    ///
    /// * [`CursorError::UninitializedCursor`] if the cursor is unbound.
    /// * [`CursorError::PastEnd`] if the cursor is already the end cursor.
    /// * [`CursorError::InvalidCursor`] if the cursor was issued by another storage or was
    ///   issued before the storage was last cleared or compacted.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::{BucketStorage, CursorError};
    ///
    /// let mut storage = BucketStorage::new();
    /// let only = storage.insert('x');
    ///
    /// let end = storage.next(only).unwrap();
    /// assert!(end.is_end());
    /// assert_eq!(storage.next(end), Err(CursorError::PastEnd));
    /// ```
    pub fn next(&self, cursor: Cursor<T>) -> Result<Cursor<T>, CursorError> {
        self.bound_slot(cursor)?;

        if cursor.is_end() {
            return Err(CursorError::PastEnd);
        }

        let (descriptor, slab) = self.live_element(cursor)?;

        // SAFETY: live_element() only returns descriptors of live slabs of this storage.
        let successor = unsafe { descriptor.as_ref() }
            .next()
            .expect("every live descriptor is followed by another one or by the sentinel");

        Ok(self.cursor_at(successor, Some(slab)))
    }

    /// Returns a cursor to the element before the one `cursor` points to. Stepping back from
    /// the [end cursor][Self::end] yields the last element.
    ///
    /// # Errors
    ///
    /// * [`CursorError::UninitializedCursor`] if the cursor is unbound.
    /// * [`CursorError::BeforeBegin`] if the cursor points to the first element, or is the end
    ///   cursor of an empty storage.
    /// * [`CursorError::InvalidCursor`] if the cursor was issued by another storage or was
    ///   issued before the storage was last cleared or compacted.
    pub fn prev(&self, cursor: Cursor<T>) -> Result<Cursor<T>, CursorError> {
        let slot = self.bound_slot(cursor)?;

        let descriptor = if cursor.is_end() {
            slot
        } else {
            self.live_element(cursor)?.0
        };

        // SAFETY: This is either the sentinel, which lives as long as the storage, or a
        // descriptor of a live slab of this storage.
        let predecessor = unsafe { descriptor.as_ref() }
            .prev()
            .ok_or(CursorError::BeforeBegin)?;

        Ok(self.cursor_at(predecessor, cursor.slab()))
    }

    /// Moves a cursor `steps` positions forward (positive) or backward (negative).
    ///
    /// This takes time linear in the number of steps.
    ///
    /// # Errors
    ///
    /// Fails with the error of the first single step that fails, see [`next()`][Self::next]
    /// and [`prev()`][Self::prev].
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    ///
    /// let mut storage: BucketStorage<u32> = (0..10).collect();
    ///
    /// let fourth = storage.advance_by(storage.begin(), 3).unwrap();
    /// assert_eq!(*storage.get(fourth).unwrap(), 3);
    ///
    /// let second = storage.advance_by(fourth, -2).unwrap();
    /// assert_eq!(*storage.get(second).unwrap(), 1);
    /// ```
    pub fn advance_by(&self, cursor: Cursor<T>, steps: isize) -> Result<Cursor<T>, CursorError> {
        let mut current = cursor;

        if steps >= 0 {
            for _ in 0..steps.unsigned_abs() {
                current = self.next(current)?;
            }
        } else {
            for _ in 0..steps.unsigned_abs() {
                current = self.prev(current)?;
            }
        }

        Ok(current)
    }

    /// Removes and drops every element and releases every slab.
    ///
    /// The slab capacity is unchanged. All previously issued cursors are rejected afterwards.
    pub fn clear(&mut self) {
        let len = self.len;
        let capacity = self.capacity();

        while let Some(value) = self.take_front() {
            drop(value);
        }

        debug_assert!(self.slabs.is_empty());
        debug_assert!(self.vacancies.is_empty());

        self.slabs.clear();
        self.vacancies.clear();

        // SAFETY: The sentinel lives as long as the storage.
        unsafe { self.sentinel.as_ref() }.set_prev(None);
        self.front = self.sentinel;

        self.storage_id = next_storage_id();

        #[cfg(debug_assertions)]
        self.integrity_check();

        debug!(len, capacity, "cleared storage");
    }

    /// Rebuilds the storage so that its elements occupy as few slabs as possible.
    ///
    /// Every element is moved to a new memory location, keeping iteration order and values.
    /// Afterwards, [`capacity()`][Self::capacity] is the smallest multiple of the slab capacity
    /// that fits [`len()`][Self::len]. All previously issued cursors are rejected afterwards.
    ///
    /// # Example
    ///
    /// ```
    /// use bucket_storage::BucketStorage;
    /// use new_zealand::nz;
    ///
    /// let mut storage = BucketStorage::with_slab_capacity(nz!(2));
    /// let cursors: Vec<_> = (0..6).map(|value| storage.insert(value)).collect();
    ///
    /// // Leave one element in each slab.
    /// for cursor in [cursors[0], cursors[2], cursors[4]] {
    ///     // SAFETY: Each cursor is live and used only once.
    ///     unsafe { storage.erase(cursor) }.unwrap();
    /// }
    /// assert_eq!(storage.capacity(), 6);
    ///
    /// storage.shrink_to_fit();
    ///
    /// assert_eq!(storage.capacity(), 4);
    /// assert!(storage.iter().eq(&[1, 3, 5]));
    /// ```
    pub fn shrink_to_fit(&mut self) {
        let capacity_before = self.capacity();

        let mut packed = Self::new_inner(self.slab_capacity, self.drop_policy);

        while let Some(value) = self.take_front() {
            packed.insert(value);
        }

        self.swap(&mut packed);

        #[cfg(debug_assertions)]
        self.integrity_check();

        debug!(
            len = self.len,
            capacity_before,
            capacity_after = self.capacity(),
            "compacted storage"
        );
    }

    /// Exchanges the contents of two storages in O(1).
    ///
    /// Cursors follow the elements they point to: a cursor issued by `self` before the swap is
    /// accepted by `other` afterwards, and vice versa.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.storage_id, &mut other.storage_id);
        mem::swap(&mut self.slab_capacity, &mut other.slab_capacity);
        mem::swap(&mut self.drop_policy, &mut other.drop_policy);
        mem::swap(&mut self.len, &mut other.len);
        mem::swap(
            &mut self.next_creation_index,
            &mut other.next_creation_index,
        );
        mem::swap(&mut self.sentinel, &mut other.sentinel);
        mem::swap(&mut self.front, &mut other.front);
        self.slabs.swap(&mut other.slabs);
        self.vacancies.swap(&mut other.vacancies);
    }

    /// Returns an iterator over the elements, in iteration order.
    pub fn iter(&self) -> Iter<'_, T> {
        // SAFETY: The sentinel lives as long as the storage.
        let last = unsafe { self.sentinel.as_ref() }.prev();

        Iter::new(self.front, last, self.len)
    }

    /// Returns an iterator that allows modifying each element, in iteration order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        // SAFETY: The sentinel lives as long as the storage.
        let last = unsafe { self.sentinel.as_ref() }.prev();

        IterMut::new(self.front, last, self.len)
    }

    /// Removes the first element in iteration order.
    pub(crate) fn take_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let first = self.begin();

        // SAFETY: We just obtained the cursor and it is not used again.
        let (value, _) = unsafe { self.take(first) }
            .expect("begin() of a non-empty storage is a live element");

        Some(value)
    }

    /// Removes the last element in iteration order.
    pub(crate) fn take_back(&mut self) -> Option<T> {
        let last = self.prev(self.end()).ok()?;

        // SAFETY: We just obtained the cursor and it is not used again.
        let (value, _) = unsafe { self.take(last) }
            .expect("the element before end() of a non-empty storage is a live element");

        Some(value)
    }

    fn add_slab(&mut self) {
        let creation_index = self.next_creation_index;

        self.next_creation_index = self
            .next_creation_index
            .checked_add(1)
            .expect("slab creation index space exhausted");

        let entry = self
            .slabs
            .push_back(Slab::new(self.slab_capacity, creation_index));

        // SAFETY: We just pushed this node, so it is live.
        let mut slab_ptr = unsafe { self.slabs.value_ptr(entry) };

        // SAFETY: The slab is owned by the registry and nothing else references it yet.
        unsafe { slab_ptr.as_mut() }.register(entry, slab_ptr);

        debug!(
            creation_index,
            slab_capacity = self.slab_capacity.get(),
            slab_count = self.slabs.len(),
            "created slab"
        );
    }

    /// Destroys an empty slab, removing it from the vacancy stack and the registry.
    fn retire_slab(&mut self, mut slab_ptr: NonNull<Slab<T>>) {
        // SAFETY: The slab is still in the registry and we hold `&mut self`.
        let slab = unsafe { slab_ptr.as_mut() };

        assert!(
            slab.is_empty(),
            "attempted to retire non-empty slab #{} of {}",
            slab.creation_index(),
            type_name::<T>()
        );

        if let Some(entry) = slab.take_vacancy_entry() {
            // SAFETY: The slab knows its own vacancy stack entry, which is live while set.
            unsafe {
                self.vacancies.erase(entry);
            }
        }

        let creation_index = slab.creation_index();
        let entry = slab
            .registry_entry()
            .expect("slabs are registered as soon as they are created");

        // SAFETY: The registry entry is live for as long as the slab exists.
        drop(unsafe { self.slabs.erase(entry) });

        debug!(
            creation_index,
            slab_count = self.slabs.len(),
            "retired slab"
        );
    }

    /// Appends a descriptor to the live-traversal chain, right before the sentinel.
    fn link_last(&mut self, descriptor: NonNull<SlotDescriptor<T>>) {
        // SAFETY: The sentinel lives as long as the storage.
        let sentinel = unsafe { self.sentinel.as_ref() };

        // SAFETY: The descriptor belongs to a live slab of this storage.
        let descriptor_ref = unsafe { descriptor.as_ref() };

        let last = sentinel.prev();

        descriptor_ref.set_prev(last);
        descriptor_ref.set_next(Some(self.sentinel));

        match last {
            // SAFETY: Chain members are live descriptors of this storage.
            Some(last) => unsafe { last.as_ref() }.set_next(Some(descriptor)),
            None => self.front = descriptor,
        }

        sentinel.set_prev(Some(descriptor));
    }

    /// Removes a descriptor from the live-traversal chain and returns its successor.
    fn unlink(&mut self, descriptor: NonNull<SlotDescriptor<T>>) -> NonNull<SlotDescriptor<T>> {
        // SAFETY: The descriptor belongs to a live slab of this storage.
        let descriptor_ref = unsafe { descriptor.as_ref() };

        let prev = descriptor_ref.prev();
        let next = descriptor_ref
            .next()
            .expect("every live descriptor is followed by another one or by the sentinel");

        // SAFETY: Chain members are live descriptors of this storage.
        unsafe { next.as_ref() }.set_prev(prev);

        match prev {
            // SAFETY: Chain members are live descriptors of this storage.
            Some(prev) => unsafe { prev.as_ref() }.set_next(Some(next)),
            None => self.front = next,
        }

        descriptor_ref.set_prev(None);
        descriptor_ref.set_next(None);

        next
    }

    /// Creates a cursor to a chain member. The owning slab is `hint` if the descriptor lies in
    /// it, otherwise it is looked up from the descriptor itself.
    fn cursor_at(
        &self,
        descriptor: NonNull<SlotDescriptor<T>>,
        hint: Option<NonNull<Slab<T>>>,
    ) -> Cursor<T> {
        if descriptor == self.sentinel {
            return self.end();
        }

        let slab = match hint {
            // SAFETY: Every slab referenced by a validated cursor or a chain member is live.
            Some(slab) if unsafe { slab.as_ref() }.contains(descriptor) => slab,
            // SAFETY: Chain members are live descriptors of this storage.
            _ => unsafe { descriptor.as_ref() }
                .owner()
                .expect("every slab descriptor knows its owner once the slab is registered"),
        };

        // SAFETY: The owner of a chain member is a live slab of this storage.
        let creation_index = unsafe { slab.as_ref() }.creation_index();

        Cursor::element(self.storage_id, descriptor, slab, creation_index)
    }

    /// Checks that the cursor is bound to a position (element or end) of this storage.
    fn bound_slot(&self, cursor: Cursor<T>) -> Result<NonNull<SlotDescriptor<T>>, CursorError> {
        let slot = cursor.slot().ok_or(CursorError::UninitializedCursor)?;

        if cursor.storage_id() != self.storage_id {
            return Err(CursorError::InvalidCursor);
        }

        Ok(slot)
    }

    /// Checks that the cursor points to a live element of this storage.
    fn live_element(&self, cursor: Cursor<T>) -> Result<LiveElement<T>, CursorError> {
        let descriptor = self.bound_slot(cursor)?;
        let slab = cursor.slab().ok_or(CursorError::InvalidCursor)?;

        // SAFETY: The cursor passed the identity check, so the descriptor belongs to this
        // storage, and the safety contract of erase() rules out dangling cursors.
        let descriptor_ref = unsafe { descriptor.as_ref() };

        // Cursors to slots that were vacated and not refilled are caught here.
        if !descriptor_ref.is_occupied() {
            return Err(CursorError::InvalidCursor);
        }

        debug_assert_eq!(descriptor_ref.owner(), Some(slab));

        Ok((descriptor, slab))
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    fn integrity_check(&self) {
        let mut occupancy_total: usize = 0;
        let mut with_released_slots: usize = 0;

        for slab in self.slabs.iter() {
            slab.integrity_check();

            assert!(
                !slab.is_empty(),
                "empty slab #{} of {} still registered",
                slab.creation_index(),
                type_name::<T>()
            );

            occupancy_total = occupancy_total.wrapping_add(slab.len());

            if slab.released_slots() > 0 {
                with_released_slots = with_released_slots.wrapping_add(1);
            }
        }

        assert_eq!(
            self.len,
            occupancy_total,
            "element count disagrees with slab occupancy in storage of {}",
            type_name::<T>()
        );

        assert_eq!(
            self.vacancies.len(),
            with_released_slots,
            "vacancy stack does not match slabs with released slots in storage of {}",
            type_name::<T>()
        );

        let mut chain_len: usize = 0;
        let mut expected_prev = None;
        let mut current = self.front;

        while current != self.sentinel {
            // SAFETY: Chain members are live descriptors of this storage.
            let descriptor = unsafe { current.as_ref() };

            assert!(
                descriptor.is_occupied(),
                "vacant descriptor in the live chain of storage of {}",
                type_name::<T>()
            );
            assert_eq!(descriptor.prev(), expected_prev);

            expected_prev = Some(current);
            current = descriptor
                .next()
                .expect("every live descriptor is followed by another one or by the sentinel");
            chain_len = chain_len.wrapping_add(1);
        }

        // SAFETY: The sentinel lives as long as the storage.
        assert_eq!(unsafe { self.sentinel.as_ref() }.prev(), expected_prev);

        assert_eq!(
            self.len,
            chain_len,
            "element count disagrees with the live chain in storage of {}",
            type_name::<T>()
        );

        assert!(self.capacity() >= self.len);
    }
}

impl<T> Default for BucketStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BucketStorage<T> {
    fn drop(&mut self) {
        let original_len = self.len;

        // Slabs drop whatever elements they still hold.
        self.vacancies.clear();
        self.slabs.clear();

        // SAFETY: The sentinel was leaked from a Box in new_inner() and is released exactly
        // once, here. Swaps only ever exchange sentinels between storages.
        drop(unsafe { Box::from_raw(self.sentinel.as_ptr()) });

        // We clean up the memory first and only then check the policy. If we are already
        // panicking, a second panic would only obscure the first one.
        if !thread::panicking() && matches!(self.drop_policy, DropPolicy::MustNotDropItems) {
            assert!(
                original_len == 0,
                "dropped a non-empty BucketStorage of {} with {original_len} items - this is forbidden by DropPolicy::MustNotDropItems",
                type_name::<T>()
            );
        }
    }
}

impl<T: Clone> Clone for BucketStorage<T> {
    /// Creates a storage with clones of every element, in the same iteration order and with
    /// the same configuration. The clones are tightly packed.
    fn clone(&self) -> Self {
        let mut copy = Self::new_inner(self.slab_capacity, self.drop_policy);
        copy.extend(self.iter().cloned());
        copy
    }

    fn clone_from(&mut self, source: &Self) {
        self.clear();

        // No slabs exist after clear(), so the slab capacity can change.
        self.slab_capacity = source.slab_capacity;
        self.drop_policy = source.drop_policy;

        self.extend(source.iter().cloned());
    }
}

impl<T> fmt::Debug for BucketStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketStorage")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("slab_capacity", &self.slab_capacity)
            .field("slab_count", &self.slabs.len())
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T: PartialEq> PartialEq for BucketStorage<T> {
    /// Two storages are equal if they hold equal elements in the same iteration order.
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for BucketStorage<T> {}

impl<T> Extend<T> for BucketStorage<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T> FromIterator<T> for BucketStorage<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut storage = Self::new();
        storage.extend(iter);
        storage
    }
}

impl<T> IntoIterator for BucketStorage<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    /// Drains the storage in iteration order.
    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}

impl<'a, T> IntoIterator for &'a BucketStorage<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut BucketStorage<T> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// SAFETY: The storage exclusively owns its elements, slabs and sentinel. The raw pointers are
// never shared outside of it except through cursors, which are not Send themselves.
unsafe impl<T: Send> Send for BucketStorage<T> {}

// SAFETY: Shared access only reads the chain and hands out shared references to elements.
unsafe impl<T: Sync> Sync for BucketStorage<T> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(BucketStorage<u32>: Send, Sync, Default, fmt::Debug, Clone, Eq);
    assert_impl_all!(BucketStorage<Cell<u32>>: Send);
    assert_not_impl_any!(BucketStorage<Cell<u32>>: Sync);
    assert_not_impl_any!(BucketStorage<Rc<u32>>: Send, Sync);

    fn values<T: Copy>(storage: &BucketStorage<T>) -> Vec<T> {
        storage.iter().copied().collect()
    }

    /// Walks from begin() to end() through the cursor API.
    fn walk<T: Copy>(storage: &BucketStorage<T>) -> Vec<T> {
        let mut result = Vec::new();
        let mut cursor = storage.begin();

        while cursor != storage.end() {
            result.push(*storage.get(cursor).unwrap());
            cursor = storage.next(cursor).unwrap();
        }

        result
    }

    #[test]
    fn empty_storage() {
        let storage = BucketStorage::<u32>::new();

        assert!(storage.is_empty());
        assert_eq!(storage.len(), 0);
        assert_eq!(storage.capacity(), 0);
        assert_eq!(storage.begin(), storage.end());
        assert_eq!(storage.slab_capacity(), DEFAULT_SLAB_CAPACITY);
        assert_eq!(storage.drop_policy(), DropPolicy::MayDropItems);

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn four_per_slab_scenario() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(4));

        let cursors: Vec<_> = (1..=5).map(|value| storage.insert(value)).collect();

        assert_eq!(storage.len(), 5);
        assert_eq!(storage.capacity(), 8);

        unsafe { storage.erase(cursors[2]) }.unwrap();
        assert_eq!(storage.len(), 4);

        storage.insert(6);
        assert_eq!(storage.capacity(), 8);
        assert_eq!(values(&storage), vec![1, 2, 4, 5, 6]);
        assert_eq!(walk(&storage), vec![1, 2, 4, 5, 6]);

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn reused_slot_keeps_address_of_descriptor() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(4));

        storage.insert(1);
        let middle = storage.insert(2);
        storage.insert(3);

        let address = NonNull::from(storage.get(middle).unwrap());
        unsafe { storage.erase(middle) }.unwrap();

        let reinserted = storage.insert(4);
        assert_eq!(NonNull::from(storage.get(reinserted).unwrap()), address);

        // Same slot, so the cursors compare equal, even though the element is new.
        assert_eq!(reinserted, middle);

        // Reinsertion goes to the end of iteration order.
        assert_eq!(values(&storage), vec![1, 3, 4]);
    }

    #[test]
    fn erase_returns_successor() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(2));

        let cursors: Vec<_> = (0..5).map(|value| storage.insert(value)).collect();

        let expected = storage.next(cursors[1]).unwrap();
        let returned = unsafe { storage.erase(cursors[1]) }.unwrap();
        assert_eq!(returned, expected);
        assert_eq!(returned, cursors[2]);
        assert_eq!(*storage.get(returned).unwrap(), 2);

        let last = unsafe { storage.erase(cursors[4]) }.unwrap();
        assert_eq!(last, storage.end());

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn erase_last_element_of_slab_retires_it() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(2));

        let a = storage.insert('a');
        let b = storage.insert('b');
        let c = storage.insert('c');
        assert_eq!(storage.capacity(), 4);

        // Crossing into the next slab while its predecessor slab is being retired.
        unsafe { storage.erase(a) }.unwrap();
        let following = unsafe { storage.erase(b) }.unwrap();

        assert_eq!(following, c);
        assert_eq!(storage.capacity(), 2);
        assert_eq!(*storage.get(following).unwrap(), 'c');
        assert_eq!(storage.prev(following), Err(CursorError::BeforeBegin));

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn erase_everything_leaves_no_capacity() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(3));

        let mut cursors: Vec<_> = (0..10).map(|value| storage.insert(value)).collect();

        // Erase in an order that hops between slabs.
        cursors.reverse();
        cursors.rotate_left(4);

        for cursor in cursors {
            unsafe { storage.erase(cursor) }.unwrap();
            #[cfg(debug_assertions)]
            storage.integrity_check();
        }

        assert!(storage.is_empty());
        assert_eq!(storage.capacity(), 0);
        assert_eq!(storage.begin(), storage.end());
    }

    #[test]
    fn take_hands_back_the_value() {
        let mut storage = BucketStorage::new();

        let cursor = storage.insert(String::from("owned"));
        storage.insert(String::from("other"));

        let (value, following) = unsafe { storage.take(cursor) }.unwrap();

        assert_eq!(value, "owned");
        assert_eq!(storage.get(following).unwrap(), "other");
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn insertion_prefers_most_recently_vacated_slab() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(2));

        let cursors: Vec<_> = (0..6).map(|value| storage.insert(value)).collect();

        // Free a slot in the first slab, then in the second.
        unsafe { storage.erase(cursors[0]) }.unwrap();
        unsafe { storage.erase(cursors[2]) }.unwrap();

        // The second slab was vacated last, so it is refilled first.
        let refill = storage.insert(10);
        assert_eq!(refill, cursors[2]);

        let refill = storage.insert(11);
        assert_eq!(refill, cursors[0]);

        assert_eq!(storage.capacity(), 6);
        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn unbound_cursor_is_rejected() {
        let mut storage = BucketStorage::<u32>::new();
        storage.insert(1);

        let unbound = Cursor::default();

        assert_eq!(storage.get(unbound), Err(CursorError::UninitializedCursor));
        assert_eq!(
            storage.get_mut(unbound),
            Err(CursorError::UninitializedCursor)
        );
        assert_eq!(storage.next(unbound), Err(CursorError::UninitializedCursor));
        assert_eq!(storage.prev(unbound), Err(CursorError::UninitializedCursor));
        assert_eq!(
            unsafe { storage.erase(unbound) },
            Err(CursorError::UninitializedCursor)
        );
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn end_cursor_cannot_be_dereferenced_or_erased() {
        let mut storage = BucketStorage::<u32>::new();
        storage.insert(1);

        let end = storage.end();

        assert_eq!(storage.get(end), Err(CursorError::InvalidCursor));
        assert_eq!(storage.next(end), Err(CursorError::PastEnd));
        assert_eq!(
            unsafe { storage.erase(end) },
            Err(CursorError::InvalidCursor)
        );
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn stepping_past_either_end_fails() {
        let mut storage = BucketStorage::<u32>::new();

        assert_eq!(storage.prev(storage.end()), Err(CursorError::BeforeBegin));
        assert_eq!(storage.prev(storage.begin()), Err(CursorError::BeforeBegin));

        let first = storage.insert(1);
        storage.insert(2);

        assert_eq!(storage.prev(first), Err(CursorError::BeforeBegin));

        let last = storage.prev(storage.end()).unwrap();
        assert_eq!(*storage.get(last).unwrap(), 2);
        assert_eq!(storage.next(last).unwrap(), storage.end());
    }

    #[test]
    fn cursor_from_other_storage_is_rejected() {
        let mut first = BucketStorage::new();
        let mut second = BucketStorage::new();

        let foreign = first.insert(1);
        second.insert(2);

        assert_eq!(second.get(foreign), Err(CursorError::InvalidCursor));
        assert_eq!(second.next(foreign), Err(CursorError::InvalidCursor));
        assert_eq!(second.next(first.end()), Err(CursorError::InvalidCursor));
        assert_eq!(
            unsafe { second.erase(foreign) },
            Err(CursorError::InvalidCursor)
        );

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn clear_resets_and_invalidates() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(3));

        let old: Vec<_> = (0..7).map(|value| storage.insert(value)).collect();
        let old_end = storage.end();

        storage.clear();

        assert!(storage.is_empty());
        assert_eq!(storage.capacity(), 0);
        assert_eq!(storage.begin(), storage.end());
        assert_eq!(storage.slab_capacity(), nz!(3));

        assert_eq!(storage.get(old[0]), Err(CursorError::InvalidCursor));
        assert_eq!(storage.prev(old_end), Err(CursorError::InvalidCursor));
        assert_ne!(old_end, storage.end());

        // Still fully usable.
        storage.insert(42);
        assert_eq!(values(&storage), vec![42]);
        assert_eq!(storage.capacity(), 3);

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn clear_drops_every_element() {
        struct Counted(Rc<Cell<usize>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));

        let mut storage = BucketStorage::with_slab_capacity(nz!(2));
        for _ in 0..5 {
            storage.insert(Counted(Rc::clone(&drops)));
        }

        storage.clear();
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn shrink_to_fit_packs_and_preserves_order() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(4));

        let cursors: Vec<_> = (0..16).map(|value| storage.insert(value)).collect();

        for cursor in cursors.iter().step_by(2) {
            unsafe { storage.erase(*cursor) }.unwrap();
        }

        // Reinsert a few so the iteration order differs from slot order.
        storage.insert(100);
        storage.insert(101);

        let before = values(&storage);
        assert_eq!(storage.capacity(), 16);

        storage.shrink_to_fit();

        assert_eq!(values(&storage), before);
        assert_eq!(storage.len(), 10);
        assert_eq!(storage.capacity(), 12);
        assert_eq!(storage.get(cursors[1]), Err(CursorError::InvalidCursor));

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn shrink_to_fit_on_empty_storage() {
        let mut storage = BucketStorage::<u8>::new();

        storage.shrink_to_fit();

        assert_eq!(storage.capacity(), 0);
        assert_eq!(storage.begin(), storage.end());
    }

    #[test]
    fn swap_moves_cursors_along() {
        let mut first = BucketStorage::with_slab_capacity(nz!(2));
        let mut second = BucketStorage::with_slab_capacity(nz!(5));

        let a = first.insert('a');
        let b = second.insert('b');
        second.insert('c');

        first.swap(&mut second);

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(first.slab_capacity(), nz!(5));
        assert_eq!(second.slab_capacity(), nz!(2));

        assert_eq!(*first.get(b).unwrap(), 'b');
        assert_eq!(*second.get(a).unwrap(), 'a');
        assert_eq!(first.get(a), Err(CursorError::InvalidCursor));

        unsafe { first.erase(b) }.unwrap();
        assert_eq!(values(&first), vec!['c']);

        #[cfg(debug_assertions)]
        first.integrity_check();
        #[cfg(debug_assertions)]
        second.integrity_check();
    }

    #[test]
    fn get_mut_modifies_in_place() {
        let mut storage = BucketStorage::new();

        let cursor = storage.insert(vec![1]);
        storage.get_mut(cursor).unwrap().push(2);

        assert_eq!(storage.get(cursor).unwrap(), &vec![1, 2]);
    }

    #[test]
    fn advance_by_both_directions() {
        let storage: BucketStorage<u32> = (0..5).collect();

        let third = storage.advance_by(storage.begin(), 2).unwrap();
        assert_eq!(*storage.get(third).unwrap(), 2);

        assert_eq!(storage.advance_by(third, 0).unwrap(), third);
        assert_eq!(storage.advance_by(third, 3).unwrap(), storage.end());
        assert_eq!(storage.advance_by(third, 4), Err(CursorError::PastEnd));
        assert_eq!(
            storage.advance_by(storage.end(), -5).unwrap(),
            storage.begin()
        );
        assert_eq!(storage.advance_by(third, -3), Err(CursorError::BeforeBegin));
    }

    #[test]
    fn cursors_order_structurally() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(2));

        let a = storage.insert(1);
        let b = storage.insert(2);
        let c = storage.insert(3);

        assert!(a < b);
        assert!(b < c);
        assert!(c < storage.end());

        // Reuse a slot in the first slab; the new element is last in iteration order but
        // its cursor still orders by slab and slot position.
        unsafe { storage.erase(a) }.unwrap();
        let d = storage.insert(4);

        assert_eq!(storage.prev(storage.end()).unwrap(), d);
        assert!(d < c);
    }

    #[test]
    fn clone_is_deep_and_packed() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(2));

        let cursors: Vec<_> = (0..6).map(|value| storage.insert(value.to_string())).collect();
        unsafe { storage.erase(cursors[0]) }.unwrap();
        unsafe { storage.erase(cursors[2]) }.unwrap();

        let copy = storage.clone();

        assert_eq!(copy, storage);
        assert_eq!(copy.slab_capacity(), nz!(2));
        assert_eq!(copy.capacity(), 4);
        assert_eq!(copy.get(cursors[1]), Err(CursorError::InvalidCursor));

        drop(storage);
        assert_eq!(
            copy.iter().map(String::as_str).collect::<Vec<_>>(),
            ["1", "3", "4", "5"]
        );
    }

    #[test]
    fn clone_from_adopts_configuration() {
        let mut source = BucketStorage::<u32>::builder()
            .slab_capacity(nz!(3))
            .build();
        source.extend([1, 2]);

        let mut target = BucketStorage::with_slab_capacity(nz!(7));
        target.extend([9, 9, 9]);

        target.clone_from(&source);

        assert_eq!(target, source);
        assert_eq!(target.slab_capacity(), nz!(3));
        assert_eq!(target.capacity(), 3);
    }

    #[test]
    fn equality_ignores_layout() {
        let mut fragmented = BucketStorage::with_slab_capacity(nz!(2));
        let cursors: Vec<_> = (0..4).map(|value| fragmented.insert(value)).collect();
        unsafe { fragmented.erase(cursors[0]) }.unwrap();

        let packed: BucketStorage<i32> = (1..4).collect();

        assert_eq!(fragmented, packed);
        assert_ne!(fragmented, BucketStorage::new());
    }

    #[test]
    fn drop_drops_remaining_elements() {
        struct Logged(Rc<RefCell<Vec<u32>>>, u32);

        impl Drop for Logged {
            fn drop(&mut self) {
                self.0.borrow_mut().push(self.1);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));

        let mut storage = BucketStorage::with_slab_capacity(nz!(2));
        for id in 0..5 {
            storage.insert(Logged(Rc::clone(&log), id));
        }

        drop(storage);

        let mut dropped = log.borrow().clone();
        dropped.sort_unstable();
        assert_eq!(dropped, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_sized_elements() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(3));

        let cursors: Vec<_> = (0..5).map(|_| storage.insert(())).collect();
        assert_eq!(storage.capacity(), 6);

        unsafe { storage.erase(cursors[1]) }.unwrap();
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.iter().count(), 4);

        #[cfg(debug_assertions)]
        storage.integrity_check();
    }

    #[test]
    fn debug_output_describes_shape() {
        let mut storage = BucketStorage::with_slab_capacity(nz!(2));
        storage.insert(1_u8);

        let output = format!("{storage:?}");

        assert!(output.contains("len: 1"));
        assert!(output.contains("capacity: 2"));
        assert!(output.contains("u8"));
    }
}
