//! One corpus element plus its lineage: the input, its place among
//! siblings, its parent, and its children.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use libafl_bolts::shmem::ShMem;

use crate::inputs::RawInput;

use super::base::BaseQueue;

/// A handle to a queue entry. Entries are always reached through this
/// `Rc<RefCell<_>>` handle so that the owning queue, siblings, and
/// parent can all hold non-owning references to the same object — see
/// [`QueueEntry::remove`] for why only `children` owns anything.
pub type EntryHandle<SM> = Rc<RefCell<QueueEntry<SM>>>;

/// One corpus element: an input, its lineage, and an optional on-disk
/// name. `next`/`prev`/`parent`/`queue` are non-owning: the owning
/// [`BaseQueue`]'s entry vector is the only thing that keeps an entry
/// alive, other than its parent's `children` list. Generic over the
/// same shared-memory backend as the [`BaseQueue`] it can belong to,
/// since `queue` back-references that queue directly.
#[derive(Debug)]
pub struct QueueEntry<SM: ShMem> {
    input: Option<RawInput>,
    next: Option<Weak<RefCell<QueueEntry<SM>>>>,
    prev: Option<Weak<RefCell<QueueEntry<SM>>>>,
    parent: Option<Weak<RefCell<QueueEntry<SM>>>>,
    parent_index: Option<usize>,
    children: Vec<EntryHandle<SM>>,
    queue: Option<Weak<RefCell<BaseQueue<SM>>>>,
    filename: Option<String>,
}

impl<SM: ShMem> QueueEntry<SM> {
    /// Builds a fresh, unlinked entry wrapping `input`.
    #[must_use]
    pub fn new(input: RawInput) -> EntryHandle<SM> {
        Rc::new(RefCell::new(Self {
            input: Some(input),
            next: None,
            prev: None,
            parent: None,
            parent_index: None,
            children: Vec::new(),
            queue: None,
            filename: None,
        }))
    }

    /// The entry's input, if it hasn't been removed yet.
    #[must_use]
    pub fn input(&self) -> Option<&RawInput> {
        self.input.as_ref()
    }

    /// The next sibling in insertion order, if any and if it is still
    /// alive.
    #[must_use]
    pub fn next(&self) -> Option<EntryHandle<SM>> {
        self.next.as_ref().and_then(Weak::upgrade)
    }

    /// The previous sibling in insertion order, if any and if it is
    /// still alive.
    #[must_use]
    pub fn prev(&self) -> Option<EntryHandle<SM>> {
        self.prev.as_ref().and_then(Weak::upgrade)
    }

    /// The entry this one was mutated from, if any and if it is still
    /// alive.
    #[must_use]
    pub fn parent(&self) -> Option<EntryHandle<SM>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Position of the parent within the owning queue at the time this
    /// entry was created, used for the broadcast/shared-memory header.
    #[must_use]
    pub fn parent_index(&self) -> Option<usize> {
        self.parent_index
    }

    /// The children mutated from this entry.
    #[must_use]
    pub fn children(&self) -> &[EntryHandle<SM>] {
        &self.children
    }

    /// The on-disk filename, if this entry's queue persists to disk.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Sets the on-disk filename.
    pub fn set_filename(&mut self, filename: String) {
        self.filename = Some(filename);
    }

    pub(super) fn set_queue(&mut self, queue: Weak<RefCell<BaseQueue<SM>>>) {
        self.queue = Some(queue);
    }

    pub(super) fn link_after(this: &EntryHandle<SM>, prev: &EntryHandle<SM>) {
        prev.borrow_mut().next = Some(Rc::downgrade(this));
        this.borrow_mut().prev = Some(Rc::downgrade(prev));
    }

    pub(super) fn set_parent(
        this: &EntryHandle<SM>,
        parent: &EntryHandle<SM>,
        parent_index: usize,
    ) {
        this.borrow_mut().parent = Some(Rc::downgrade(parent));
        this.borrow_mut().parent_index = Some(parent_index);
        parent.borrow_mut().children.push(Rc::clone(this));
    }

    /// Unlinks this entry from its siblings, recursively removes its
    /// children, and drops its input. Safe whether or not the entry is
    /// currently linked into a queue.
    pub fn remove(this: &EntryHandle<SM>) {
        let (next, prev) = {
            let entry = this.borrow();
            (entry.next(), entry.prev())
        };
        if let Some(next) = &next {
            next.borrow_mut().prev = prev.as_ref().map(Rc::downgrade);
        }
        if let Some(prev) = &prev {
            prev.borrow_mut().next = next.as_ref().map(Rc::downgrade);
        }

        let children = std::mem::take(&mut this.borrow_mut().children);
        for child in &children {
            Self::remove(child);
        }

        let mut entry = this.borrow_mut();
        entry.next = None;
        entry.prev = None;
        entry.queue = None;
        entry.parent = None;
        entry.parent_index = None;
        entry.filename = None;
        entry.input = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libafl_bolts::shmem::UnixShMem;

    fn entry(bytes: Vec<u8>) -> EntryHandle<UnixShMem> {
        QueueEntry::new(RawInput::new(bytes))
    }

    #[test]
    fn remove_is_safe_when_unlinked() {
        let entry = entry(vec![1]);
        QueueEntry::remove(&entry);
        assert!(entry.borrow().input().is_none());
    }

    #[test]
    fn remove_splices_neighbours() {
        let a = entry(vec![1]);
        let b = entry(vec![2]);
        let c = entry(vec![3]);
        QueueEntry::link_after(&b, &a);
        QueueEntry::link_after(&c, &b);

        QueueEntry::remove(&b);

        assert!(Rc::ptr_eq(&a.borrow().next().unwrap(), &c));
        assert!(Rc::ptr_eq(&c.borrow().prev().unwrap(), &a));
    }

    #[test]
    fn remove_recurses_into_children() {
        let parent = entry(vec![1]);
        let child = entry(vec![2]);
        QueueEntry::set_parent(&child, &parent, 0);

        QueueEntry::remove(&parent);

        assert!(child.borrow().input().is_none());
        assert!(parent.borrow().children().is_empty());
    }
}
