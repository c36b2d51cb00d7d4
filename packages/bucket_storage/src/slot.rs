use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

use crate::Slab;

/// A link in the live-traversal chain. `None` only ever appears as the `prev` of the first live
/// descriptor (or of the sentinel when the storage is empty) and on vacant descriptors.
pub(crate) type Link<T> = Option<NonNull<SlotDescriptor<T>>>;

/// Describes one storage slot of a slab.
///
/// Descriptors are allocated together with their slab and never move, so the address of a
/// descriptor is a stable identity for "this slot" across any number of reuse cycles. The
/// storage also owns one extra descriptor that never holds a value: the sentinel that terminates
/// the live-traversal chain and represents the end position.
///
/// All fields are cells because the chain is rewired through raw pointers while other
/// descriptors of the same table may be observed through shared references.
pub(crate) struct SlotDescriptor<T> {
    /// Points to the value in the slab's raw storage while the slot is occupied.
    value: Cell<Option<NonNull<T>>>,

    prev: Cell<Link<T>>,
    next: Cell<Link<T>>,

    /// The slab whose descriptor table contains this descriptor. Set once, when the slab is
    /// registered with its storage. Always `None` for the sentinel.
    owner: Cell<Option<NonNull<Slab<T>>>>,
}

impl<T> SlotDescriptor<T> {
    #[must_use]
    pub(crate) const fn vacant() -> Self {
        Self {
            value: Cell::new(None),
            prev: Cell::new(None),
            next: Cell::new(None),
            owner: Cell::new(None),
        }
    }

    #[must_use]
    pub(crate) fn is_occupied(&self) -> bool {
        self.value.get().is_some()
    }

    #[must_use]
    pub(crate) fn value(&self) -> Option<NonNull<T>> {
        self.value.get()
    }

    pub(crate) fn set_value(&self, value: Option<NonNull<T>>) {
        self.value.set(value);
    }

    #[must_use]
    pub(crate) fn prev(&self) -> Link<T> {
        self.prev.get()
    }

    pub(crate) fn set_prev(&self, prev: Link<T>) {
        self.prev.set(prev);
    }

    #[must_use]
    pub(crate) fn next(&self) -> Link<T> {
        self.next.get()
    }

    pub(crate) fn set_next(&self, next: Link<T>) {
        self.next.set(next);
    }

    #[must_use]
    pub(crate) fn owner(&self) -> Option<NonNull<Slab<T>>> {
        self.owner.get()
    }

    pub(crate) fn set_owner(&self, owner: NonNull<Slab<T>>) {
        self.owner.set(Some(owner));
    }
}

impl<T> fmt::Debug for SlotDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotDescriptor")
            .field("occupied", &self.is_occupied())
            .field("prev", &self.prev.get())
            .field("next", &self.next.get())
            .field("owner", &self.owner.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_vacant_and_unlinked() {
        let descriptor = SlotDescriptor::<u32>::vacant();

        assert!(!descriptor.is_occupied());
        assert!(descriptor.value().is_none());
        assert!(descriptor.prev().is_none());
        assert!(descriptor.next().is_none());
        assert!(descriptor.owner().is_none());
    }

    #[test]
    fn occupancy_follows_value_pointer() {
        let mut item = 5_u32;
        let descriptor = SlotDescriptor::<u32>::vacant();

        descriptor.set_value(Some(NonNull::from(&mut item)));
        assert!(descriptor.is_occupied());

        descriptor.set_value(None);
        assert!(!descriptor.is_occupied());
    }

    #[test]
    fn links_round_trip() {
        let a = SlotDescriptor::<u32>::vacant();
        let b = SlotDescriptor::<u32>::vacant();

        a.set_next(Some(NonNull::from(&b)));
        b.set_prev(Some(NonNull::from(&a)));

        assert_eq!(a.next(), Some(NonNull::from(&b)));
        assert_eq!(b.prev(), Some(NonNull::from(&a)));
        assert!(a.prev().is_none());
        assert!(b.next().is_none());
    }

    #[test]
    fn debug_reports_occupancy() {
        let descriptor = SlotDescriptor::<u32>::vacant();

        let output = format!("{descriptor:?}");
        assert!(output.contains("occupied: false"));
        assert!(output.ends_with(", .. }"));
    }
}
