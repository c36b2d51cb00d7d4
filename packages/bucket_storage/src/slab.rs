use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::any::type_name;
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::{fmt, iter};

use crate::{NodeHandle, OwnedList, SlotDescriptor};

/// A fixed-capacity block of raw storage for up to `capacity` values of `T`, paired with a
/// parallel table of [`SlotDescriptor`]s.
///
/// Neither the raw storage nor the descriptor table ever moves or grows, so both the address of
/// a value and the address of its descriptor are stable for as long as the slab exists. A slab
/// is created by its storage exactly when an insertion finds no vacancy anywhere and is retired
/// the moment its last value is released.
///
/// Slots are handed out reuse-first: previously released descriptors are taken from the local
/// vacancy stack before any never-used descriptor (tracked by the high water mark) is touched.
pub(crate) struct Slab<T> {
    /// Assigned once at creation. Slabs of one storage have strictly increasing indexes in
    /// creation order.
    creation_index: u64,

    capacity: NonZero<usize>,

    /// The descriptor table, obtained from a leaked boxed slice so we only ever access it
    /// through raw pointers.
    descriptors: NonNull<[SlotDescriptor<T>]>,

    /// `capacity` slots of uninitialized memory. Dangling (but aligned) if `T` is zero-sized.
    storage: NonNull<T>,

    /// Number of occupied slots.
    occupancy: usize,

    /// Number of descriptors, counted from the start of the table, that have ever been handed
    /// out. Descriptors at and beyond this index have never held a value.
    high_water_mark: usize,

    /// Descriptors that held a value before and are vacant now. Used as a stack.
    vacant: OwnedList<NonNull<SlotDescriptor<T>>>,

    /// Our node in the storage's slab registry, for O(1) self-removal.
    registry_entry: Option<NodeHandle<Self>>,

    /// Our node in the storage's stack of slabs with released slots, if we are on it.
    vacancy_entry: Option<NodeHandle<NonNull<Self>>>,
}

impl<T> Slab<T> {
    #[must_use]
    pub(crate) fn new(capacity: NonZero<usize>, creation_index: u64) -> Self {
        let descriptors: Box<[SlotDescriptor<T>]> = iter::repeat_with(SlotDescriptor::vacant)
            .take(capacity.get())
            .collect();

        let layout = Self::storage_layout(capacity);

        let storage = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // SAFETY: The layout is valid for an array of T and we just checked it is not
            // zero-sized.
            let ptr = unsafe { alloc(layout) };
            NonNull::new(ptr.cast::<T>()).unwrap_or_else(|| handle_alloc_error(layout))
        };

        Self {
            creation_index,
            capacity,
            descriptors: NonNull::from(Box::leak(descriptors)),
            storage,
            occupancy: 0,
            high_water_mark: 0,
            vacant: OwnedList::new(),
            registry_entry: None,
            vacancy_entry: None,
        }
    }

    #[must_use]
    fn storage_layout(capacity: NonZero<usize>) -> Layout {
        Layout::array::<T>(capacity.get()).expect("slab storage layout must fit in memory")
    }

    /// Records where this slab lives. Must be called once, after the slab has been moved into
    /// its final (stable) location in the registry.
    pub(crate) fn register(&mut self, registry_entry: NodeHandle<Self>, this: NonNull<Self>) {
        assert!(
            self.registry_entry.is_none(),
            "slab #{} of {} registered twice",
            self.creation_index,
            type_name::<T>()
        );

        self.registry_entry = Some(registry_entry);

        for index in 0..self.capacity.get() {
            // SAFETY: index is within the table, which lives as long as we do.
            unsafe { self.descriptor_ptr(index).as_ref() }.set_owner(this);
        }
    }

    #[must_use]
    pub(crate) fn creation_index(&self) -> u64 {
        self.creation_index
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.occupancy
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.occupancy == 0
    }

    #[must_use]
    pub(crate) fn has_vacancy(&self) -> bool {
        !self.vacant.is_empty() || self.high_water_mark < self.capacity.get()
    }

    /// Number of released slots waiting on the local vacancy stack.
    #[must_use]
    pub(crate) fn released_slots(&self) -> usize {
        self.vacant.len()
    }

    #[must_use]
    pub(crate) fn registry_entry(&self) -> Option<NodeHandle<Self>> {
        self.registry_entry
    }

    pub(crate) fn set_vacancy_entry(&mut self, entry: NodeHandle<NonNull<Self>>) {
        self.vacancy_entry = Some(entry);
    }

    pub(crate) fn take_vacancy_entry(&mut self) -> Option<NodeHandle<NonNull<Self>>> {
        self.vacancy_entry.take()
    }

    /// Whether `descriptor` points into this slab's descriptor table.
    #[must_use]
    pub(crate) fn contains(&self, descriptor: NonNull<SlotDescriptor<T>>) -> bool {
        let start = self.table_start().as_ptr().addr();

        // Cannot overflow because the table exists in memory.
        let table_size = size_of::<SlotDescriptor<T>>().wrapping_mul(self.capacity.get());
        let end = start.wrapping_add(table_size);

        (start..end).contains(&descriptor.as_ptr().addr())
    }

    fn table_start(&self) -> NonNull<SlotDescriptor<T>> {
        self.descriptors.cast()
    }

    fn descriptor_ptr(&self, index: usize) -> NonNull<SlotDescriptor<T>> {
        assert!(
            index < self.capacity.get(),
            "descriptor {index} out of bounds in slab #{} of {}",
            self.creation_index,
            type_name::<T>()
        );

        // SAFETY: Guarded by the bounds check above.
        unsafe { self.table_start().add(index) }
    }

    fn index_of(&self, descriptor: NonNull<SlotDescriptor<T>>) -> usize {
        assert!(
            self.contains(descriptor),
            "descriptor does not belong to slab #{} of {}",
            self.creation_index,
            type_name::<T>()
        );

        // SAFETY: We asserted above that both pointers are within the same table allocation.
        let offset = unsafe { descriptor.offset_from(self.table_start()) };

        usize::try_from(offset).expect("guarded by containment check above")
    }

    fn slot_ptr(&self, index: usize) -> NonNull<T> {
        assert!(
            index < self.capacity.get(),
            "slot {index} out of bounds in slab #{} of {}",
            self.creation_index,
            type_name::<T>()
        );

        // SAFETY: Guarded by the bounds check above. For zero-sized T the offset is zero.
        unsafe { self.storage.add(index) }
    }

    /// Picks the slot the next value goes into: the most recently released descriptor if there
    /// is one, otherwise the first never-used descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the slab has no vacancy.
    fn take_vacant_slot(&mut self) -> NonNull<SlotDescriptor<T>> {
        if let Some(descriptor) = self.vacant.pop_back() {
            return descriptor;
        }

        assert!(
            self.high_water_mark < self.capacity.get(),
            "take_vacant_slot() on a full slab #{} of {}",
            self.creation_index,
            type_name::<T>()
        );

        let descriptor = self.descriptor_ptr(self.high_water_mark);

        // Cannot overflow because we just checked it is below capacity.
        self.high_water_mark = self.high_water_mark.wrapping_add(1);

        descriptor
    }

    /// Moves `value` into a vacant slot and returns the descriptor of that slot. The descriptor
    /// is not linked into any traversal chain; that is up to the caller.
    ///
    /// # Panics
    ///
    /// Panics if the slab has no vacancy.
    pub(crate) fn insert(&mut self, value: T) -> NonNull<SlotDescriptor<T>> {
        let descriptor = self.take_vacant_slot();
        let slot = self.slot_ptr(self.index_of(descriptor));

        // SAFETY: The slot is vacant (its descriptor came off a vacancy source) and is valid
        // for writes of T.
        unsafe {
            slot.write(value);
        }

        // SAFETY: The descriptor is within our table, which lives as long as we do.
        let descriptor_ref = unsafe { descriptor.as_ref() };
        debug_assert!(!descriptor_ref.is_occupied());
        descriptor_ref.set_value(Some(slot));

        // Cannot overflow because occupancy is bounded by capacity.
        self.occupancy = self.occupancy.wrapping_add(1);

        descriptor
    }

    /// Moves the value out of an occupied slot, marks the slot vacant and pushes its descriptor
    /// onto the local vacancy stack. The caller is responsible for unlinking the descriptor
    /// from the traversal chain.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor does not belong to this slab or its slot is vacant.
    pub(crate) fn release_slot(&mut self, descriptor: NonNull<SlotDescriptor<T>>) -> T {
        assert!(
            self.contains(descriptor),
            "release_slot() with a descriptor from another slab than #{} of {}",
            self.creation_index,
            type_name::<T>()
        );

        // SAFETY: The descriptor is within our table, which lives as long as we do.
        let descriptor_ref = unsafe { descriptor.as_ref() };

        let slot = descriptor_ref.value().unwrap_or_else(|| {
            panic!(
                "release_slot() on a vacant slot in slab #{} of {}",
                self.creation_index,
                type_name::<T>()
            )
        });

        descriptor_ref.set_value(None);

        // SAFETY: The slot was occupied, so it holds an initialized T, and we just marked it
        // vacant so nobody else will read or drop it.
        let value = unsafe { slot.read() };

        self.vacant.push_back(descriptor);

        self.occupancy = self
            .occupancy
            .checked_sub(1)
            .expect("the slot was occupied so occupancy must be non-zero");

        value
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        let mut observed_occupied: usize = 0;

        for index in 0..self.capacity.get() {
            // SAFETY: index is within the table, which lives as long as we do.
            let descriptor = unsafe { self.descriptor_ptr(index).as_ref() };

            if descriptor.is_occupied() {
                assert!(
                    index < self.high_water_mark,
                    "occupied descriptor {index} lies beyond high water mark {} in slab #{} of {}",
                    self.high_water_mark,
                    self.creation_index,
                    type_name::<T>()
                );

                observed_occupied = observed_occupied.wrapping_add(1);
            }
        }

        assert_eq!(
            self.occupancy,
            observed_occupied,
            "occupancy counter disagrees with descriptors in slab #{} of {}",
            self.creation_index,
            type_name::<T>()
        );

        for descriptor in self.vacant.iter() {
            // SAFETY: Vacancy stack entries always point into our own table.
            let descriptor_ref = unsafe { descriptor.as_ref() };

            assert!(
                self.contains(*descriptor) && !descriptor_ref.is_occupied(),
                "vacancy stack of slab #{} of {} holds a foreign or occupied descriptor",
                self.creation_index,
                type_name::<T>()
            );
        }

        assert_eq!(
            self.occupancy.wrapping_add(self.vacant.len()),
            self.high_water_mark,
            "every used descriptor must be either occupied or stacked in slab #{} of {}",
            self.creation_index,
            type_name::<T>()
        );
    }
}

impl<T> Drop for Slab<T> {
    fn drop(&mut self) {
        // Only slabs torn down together with a non-empty storage still hold values here.
        for index in 0..self.high_water_mark {
            // SAFETY: index is within the table, which we have not released yet.
            let descriptor = unsafe { self.descriptor_ptr(index).as_ref() };

            if let Some(slot) = descriptor.value() {
                descriptor.set_value(None);

                // SAFETY: An occupied descriptor points at an initialized T that nobody else
                // will touch again.
                unsafe {
                    ptr::drop_in_place(slot.as_ptr());
                }
            }
        }

        let layout = Self::storage_layout(self.capacity);

        if layout.size() != 0 {
            // SAFETY: The layout matches the one we allocated with.
            unsafe {
                dealloc(self.storage.as_ptr().cast(), layout);
            }
        }

        // SAFETY: The table was leaked from a Box in new() and is released exactly once.
        drop(unsafe { Box::from_raw(self.descriptors.as_ptr()) });
    }
}

impl<T> fmt::Debug for Slab<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("creation_index", &self.creation_index)
            .field("capacity", &self.capacity)
            .field("occupancy", &self.len())
            .field("high_water_mark", &self.high_water_mark)
            .field("released_slots", &self.vacant.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::arithmetic_side_effects,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use new_zealand::nz;

    use super::*;

    fn value_of<T: Copy>(descriptor: NonNull<SlotDescriptor<T>>) -> T {
        let descriptor = unsafe { descriptor.as_ref() };
        unsafe { descriptor.value().expect("occupied").read() }
    }

    #[test]
    fn smoke_test() {
        let mut slab = Slab::<u32>::new(nz!(3), 0);

        assert!(slab.is_empty());
        assert!(slab.has_vacancy());

        let a = slab.insert(42);
        let b = slab.insert(43);
        let c = slab.insert(44);

        assert_eq!(value_of(a), 42);
        assert_eq!(value_of(b), 43);
        assert_eq!(value_of(c), 44);
        assert_eq!(slab.len(), 3);
        assert!(!slab.has_vacancy());

        assert_eq!(slab.release_slot(b), 43);
        assert_eq!(slab.len(), 2);
        assert!(slab.has_vacancy());
        assert_eq!(slab.released_slots(), 1);

        #[cfg(debug_assertions)]
        slab.integrity_check();
    }

    #[test]
    fn fills_never_used_slots_in_order() {
        let mut slab = Slab::<u32>::new(nz!(3), 0);

        let a = slab.insert(1);
        let b = slab.insert(2);

        assert_eq!(slab.index_of(a), 0);
        assert_eq!(slab.index_of(b), 1);
    }

    #[test]
    fn reuses_released_descriptor_first() {
        let mut slab = Slab::<u32>::new(nz!(4), 0);

        let _a = slab.insert(1);
        let b = slab.insert(2);
        let _c = slab.insert(3);

        slab.release_slot(b);

        // The released descriptor wins over the never-used one at index 3.
        let d = slab.insert(4);
        assert_eq!(d, b);
        assert_eq!(value_of(d), 4);
        assert_eq!(slab.released_slots(), 0);

        // Now the never-used one is next.
        let e = slab.insert(5);
        assert_eq!(slab.index_of(e), 3);

        #[cfg(debug_assertions)]
        slab.integrity_check();
    }

    #[test]
    fn reuse_is_last_released_first() {
        let mut slab = Slab::<u32>::new(nz!(4), 0);

        let a = slab.insert(1);
        let b = slab.insert(2);

        slab.release_slot(a);
        slab.release_slot(b);

        assert_eq!(slab.insert(3), b);
        assert_eq!(slab.insert(4), a);
    }

    #[test]
    fn value_addresses_are_stable() {
        let mut slab = Slab::<String>::new(nz!(8), 0);

        let keep = slab.insert("keep".to_string());
        let keep_ptr = unsafe { keep.as_ref() }.value();

        for round in 0..10 {
            let temp = slab.insert(round.to_string());
            slab.release_slot(temp);
        }

        assert_eq!(unsafe { keep.as_ref() }.value(), keep_ptr);
        assert_eq!(
            unsafe { keep.as_ref().value().expect("occupied").as_ref() },
            "keep"
        );
    }

    #[test]
    fn contains_only_own_descriptors() {
        let mut first = Slab::<u32>::new(nz!(2), 0);
        let mut second = Slab::<u32>::new(nz!(2), 1);

        let a = first.insert(1);
        let b = second.insert(2);

        assert!(first.contains(a));
        assert!(!first.contains(b));
        assert!(second.contains(b));
        assert!(!second.contains(a));
    }

    #[test]
    fn contains_covers_exactly_the_table() {
        let mut slab = Slab::<u64>::new(nz!(3), 0);

        let first = slab.insert(1);
        slab.insert(2);
        let last = slab.insert(3);

        assert!(slab.contains(first));
        assert!(slab.contains(last));

        // SAFETY: One past the end of the table is still within the same allocation bounds.
        let past_end = unsafe { last.add(1) };
        assert!(!slab.contains(past_end));

        assert_eq!(value_of(last), 3);
    }

    #[test]
    #[should_panic]
    fn insert_into_full_slab_panics() {
        let mut slab = Slab::<u32>::new(nz!(1), 0);

        _ = slab.insert(1);
        _ = slab.insert(2);
    }

    #[test]
    #[should_panic]
    fn release_vacant_slot_panics() {
        let mut slab = Slab::<u32>::new(nz!(2), 0);

        let a = slab.insert(1);
        slab.release_slot(a);
        slab.release_slot(a);
    }

    #[test]
    #[should_panic]
    fn release_foreign_descriptor_panics() {
        let mut first = Slab::<u32>::new(nz!(2), 0);
        let mut second = Slab::<u32>::new(nz!(2), 1);

        let a = first.insert(1);
        second.release_slot(a);
    }

    #[test]
    fn register_sets_owner_on_every_descriptor() {
        let mut registry = OwnedList::new();
        let handle = registry.push_back(Slab::<u32>::new(nz!(3), 7));
        let mut slab_ptr = unsafe { registry.value_ptr(handle) };

        let slab = unsafe { slab_ptr.as_mut() };
        slab.register(handle, slab_ptr);

        assert_eq!(slab.registry_entry(), Some(handle));
        assert_eq!(slab.creation_index(), 7);

        for index in 0..3 {
            let descriptor = unsafe { slab.descriptor_ptr(index).as_ref() };
            assert_eq!(descriptor.owner(), Some(slab_ptr));
        }
    }

    #[test]
    fn drop_releases_remaining_values() {
        struct Counted(Rc<Cell<usize>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut slab = Slab::new(nz!(4), 0);

        slab.insert(Counted(Rc::clone(&drops)));
        let released = slab.insert(Counted(Rc::clone(&drops)));
        slab.insert(Counted(Rc::clone(&drops)));

        drop(slab.release_slot(released));
        assert_eq!(drops.get(), 1);

        drop(slab);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn zero_sized_values_work() {
        let mut slab = Slab::<()>::new(nz!(3), 0);

        let a = slab.insert(());
        let b = slab.insert(());

        assert_ne!(a, b);
        slab.release_slot(a);
        assert_eq!(slab.len(), 1);

        #[cfg(debug_assertions)]
        slab.integrity_check();
    }
}
