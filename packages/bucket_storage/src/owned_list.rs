use std::any::type_name;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::{fmt, mem};

/// A doubly linked list that exclusively owns its heap-allocated nodes.
///
/// Appending returns a [`NodeHandle`] that can later be used to unlink that specific node in
/// O(1), which is what makes this list suitable as a registry of objects that need to remove
/// themselves (slabs) and as a vacancy stack (push and pop at the back).
///
/// Values live inside the nodes, so a value never moves for as long as its node is in the list.
/// Callers may rely on [`value_ptr()`][1] returning the same address for the lifetime of a node.
///
/// [1]: Self::value_ptr
pub(crate) struct OwnedList<T> {
    head: Option<NonNull<ListNode<T>>>,
    tail: Option<NonNull<ListNode<T>>>,
    len: usize,

    // We own the nodes and drop them (and the values inside) ourselves.
    _owns: PhantomData<Box<ListNode<T>>>,
}

struct ListNode<T> {
    value: T,
    prev: Option<NonNull<Self>>,
    next: Option<NonNull<Self>>,
}

/// Identifies one node of an [`OwnedList`]. Only meaningful for the list that issued it and only
/// until that node is erased.
pub(crate) struct NodeHandle<T> {
    node: NonNull<ListNode<T>>,
}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NodeHandle<T> {}

impl<T> PartialEq for NodeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<T> Eq for NodeHandle<T> {}

impl<T> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeHandle").field(&self.node).finish()
    }
}

impl<T> OwnedList<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _owns: PhantomData,
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub(crate) fn front(&self) -> Option<NodeHandle<T>> {
        self.head.map(|node| NodeHandle { node })
    }

    #[must_use]
    pub(crate) fn back(&self) -> Option<NodeHandle<T>> {
        self.tail.map(|node| NodeHandle { node })
    }

    /// Appends a value and returns the handle of the node that now owns it.
    pub(crate) fn push_back(&mut self, value: T) -> NodeHandle<T> {
        let node = NonNull::from(Box::leak(Box::new(ListNode {
            value,
            prev: self.tail,
            next: None,
        })));

        match self.tail {
            // SAFETY: The tail is a live node owned by this list and we hold `&mut self`.
            Some(mut tail) => unsafe { tail.as_mut() }.next = Some(node),
            None => self.head = Some(node),
        }

        self.tail = Some(node);

        // Cannot overflow because every node occupies memory.
        self.len = self.len.wrapping_add(1);

        NodeHandle { node }
    }

    /// Unlinks the node identified by `handle`, destroys it and returns the value it held.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty. That can only happen through a logic error in the caller,
    /// which is why this is not a recoverable error.
    ///
    /// # Safety
    ///
    /// The handle must have been issued by this list and its node must not have been erased yet.
    pub(crate) unsafe fn erase(&mut self, handle: NodeHandle<T>) -> T {
        assert!(
            !self.is_empty(),
            "EmptyListError: erase() called on an empty list of {}",
            type_name::<T>()
        );

        // SAFETY: The caller guarantees the node is live and owned by this list. Nodes were
        // created via Box::leak() in push_back() so reconstituting the box is valid.
        let node = unsafe { Box::from_raw(handle.node.as_ptr()) };

        match node.prev {
            // SAFETY: Neighbors of a live node are live nodes of the same list.
            Some(mut prev) => unsafe { prev.as_mut() }.next = node.next,
            None => self.head = node.next,
        }

        match node.next {
            // SAFETY: Neighbors of a live node are live nodes of the same list.
            Some(mut next) => unsafe { next.as_mut() }.prev = node.prev,
            None => self.tail = node.prev,
        }

        // Cannot wrap because we asserted above that the list is not empty.
        self.len = self.len.wrapping_sub(1);

        node.value
    }

    /// Removes the last value, if any.
    pub(crate) fn pop_back(&mut self) -> Option<T> {
        let tail = self.back()?;

        // SAFETY: The tail handle was just obtained from this list, so the node is live.
        Some(unsafe { self.erase(tail) })
    }

    /// # Safety
    ///
    /// The handle must have been issued by this list and its node must not have been erased yet.
    #[must_use]
    pub(crate) unsafe fn get(&self, handle: NodeHandle<T>) -> &T {
        debug_assert!(self.len > 0, "node handle used with an empty list");

        // SAFETY: Forwarding the liveness guarantee from the caller.
        unsafe { &(*handle.node.as_ptr()).value }
    }

    /// Returns a pointer to the value held by a node. The pointer remains valid until the node
    /// is erased or the list is dropped, regardless of other list operations.
    ///
    /// # Safety
    ///
    /// The handle must have been issued by this list and its node must not have been erased yet.
    #[must_use]
    pub(crate) unsafe fn value_ptr(&mut self, handle: NodeHandle<T>) -> NonNull<T> {
        debug_assert!(self.len > 0, "node handle used with an empty list");

        // SAFETY: Forwarding the liveness guarantee from the caller. We only compute a field
        // address here, without creating a reference.
        let value = unsafe { &raw mut (*handle.node.as_ptr()).value };

        // SAFETY: A field of a live node is never at the null address.
        unsafe { NonNull::new_unchecked(value) }
    }

    /// Removes and drops every value, front to back.
    pub(crate) fn clear(&mut self) {
        while let Some(head) = self.front() {
            // SAFETY: The handle was just obtained from this list, so the node is live.
            drop(unsafe { self.erase(head) });
        }
    }

    pub(crate) fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            _list: PhantomData,
        }
    }
}

impl<T> Default for OwnedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for OwnedList<T> {
    fn clone(&self) -> Self {
        let mut copy = Self::new();

        for value in self.iter() {
            copy.push_back(value.clone());
        }

        copy
    }
}

impl<T> Drop for OwnedList<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// SAFETY: The list owns its values the same way a Box would, so it can move between threads
// whenever the values can.
unsafe impl<T: Send> Send for OwnedList<T> {}

// SAFETY: Shared access only ever hands out shared references to the values.
unsafe impl<T: Sync> Sync for OwnedList<T> {}

/// Front-to-back iterator over the values of an [`OwnedList`].
pub(crate) struct Iter<'a, T> {
    next: Option<NonNull<ListNode<T>>>,
    _list: PhantomData<&'a OwnedList<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;

        // SAFETY: The list is borrowed for 'a, so no node can be erased while we iterate.
        let node = unsafe { node.as_ref() };
        self.next = node.next;

        Some(&node.value)
    }
}

impl<T> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::arithmetic_side_effects,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(OwnedList<u32>: Send, Sync);
    assert_not_impl_any!(OwnedList<Rc<u32>>: Send, Sync);

    fn collect(list: &OwnedList<u32>) -> Vec<u32> {
        list.iter().copied().collect()
    }

    #[test]
    fn starts_empty() {
        let list = OwnedList::<u32>::new();

        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.front().is_none());
        assert!(list.back().is_none());
    }

    #[test]
    fn push_back_appends_in_order() {
        let mut list = OwnedList::new();

        let first = list.push_back(1);
        list.push_back(2);
        let last = list.push_back(3);

        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list), vec![1, 2, 3]);
        assert_eq!(list.front(), Some(first));
        assert_eq!(list.back(), Some(last));
    }

    #[test]
    fn erase_head_middle_and_tail() {
        let mut list = OwnedList::new();

        let a = list.push_back(1);
        let b = list.push_back(2);
        let c = list.push_back(3);
        let d = list.push_back(4);

        assert_eq!(unsafe { list.erase(b) }, 2);
        assert_eq!(collect(&list), vec![1, 3, 4]);

        assert_eq!(unsafe { list.erase(a) }, 1);
        assert_eq!(collect(&list), vec![3, 4]);
        assert_eq!(list.front(), Some(c));

        assert_eq!(unsafe { list.erase(d) }, 4);
        assert_eq!(collect(&list), vec![3]);
        assert_eq!(list.back(), Some(c));

        assert_eq!(unsafe { list.erase(c) }, 3);
        assert!(list.is_empty());
        assert!(list.front().is_none());
        assert!(list.back().is_none());
    }

    #[test]
    fn pop_back_behaves_as_stack() {
        let mut list = OwnedList::new();

        list.push_back(10);
        list.push_back(20);

        assert_eq!(list.pop_back(), Some(20));
        list.push_back(30);
        assert_eq!(list.pop_back(), Some(30));
        assert_eq!(list.pop_back(), Some(10));
        assert_eq!(list.pop_back(), None);
    }

    #[test]
    #[should_panic]
    fn erase_on_empty_list_panics() {
        let mut list = OwnedList::new();
        let handle = list.push_back(1);
        _ = list.pop_back();

        // The handle is stale, but the emptiness assertion fires before it is touched.
        _ = unsafe { list.erase(handle) };
    }

    #[test]
    fn value_ptr_is_stable_across_other_operations() {
        let mut list = OwnedList::new();

        let keep = list.push_back(String::from("stable"));
        let before = unsafe { list.value_ptr(keep) };

        for i in 0..100 {
            let handle = list.push_back(i.to_string());
            if i % 2 == 0 {
                _ = unsafe { list.erase(handle) };
            }
        }

        let after = unsafe { list.value_ptr(keep) };
        assert_eq!(before, after);
        assert_eq!(unsafe { list.get(keep) }, "stable");
    }

    #[test]
    fn clone_copies_every_value() {
        let mut list = OwnedList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);

        let copy = list.clone();

        assert_eq!(copy.len(), 3);
        assert_eq!(collect(&copy), vec![1, 2, 3]);

        drop(list);
        assert_eq!(collect(&copy), vec![1, 2, 3]);
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a = OwnedList::new();
        a.push_back(1);

        let mut b = OwnedList::new();
        b.push_back(2);
        b.push_back(3);

        a.swap(&mut b);

        assert_eq!(collect(&a), vec![2, 3]);
        assert_eq!(collect(&b), vec![1]);
    }

    #[test]
    fn clear_and_drop_release_values() {
        struct Counted(Rc<Cell<usize>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));

        let mut list = OwnedList::new();
        list.push_back(Counted(Rc::clone(&drops)));
        list.push_back(Counted(Rc::clone(&drops)));

        list.clear();
        assert_eq!(drops.get(), 2);
        assert!(list.is_empty());

        list.push_back(Counted(Rc::clone(&drops)));
        drop(list);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn clear_drops_front_to_back() {
        struct Logged(Rc<RefCell<Vec<u32>>>, u32);

        impl Drop for Logged {
            fn drop(&mut self) {
                self.0.borrow_mut().push(self.1);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));

        let mut list = OwnedList::new();
        for id in 0..4 {
            list.push_back(Logged(Rc::clone(&log), id));
        }

        list.clear();
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn debug_lists_values() {
        let mut list = OwnedList::new();
        list.push_back(7);
        list.push_back(8);

        assert_eq!(format!("{list:?}"), "[7, 8]");
    }
}
