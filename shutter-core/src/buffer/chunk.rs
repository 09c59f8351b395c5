//! Fixed-capacity slot chunk, the link of an event buffer's chain.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// One fixed-capacity run of slots.
///
/// The owning writer fills slots front to back and advertises progress
/// through `published`: a release store after the slots are written, an
/// acquire load on the reader side. Readers must never touch a slot at or
/// beyond the published count. Slot cells are relaxed atomics so that a
/// misbehaving caller can at worst read stale words, never tear them.
pub(crate) struct Chunk {
    slots: Box<[AtomicU32]>,
    published: AtomicUsize,
    next: OnceLock<Box<Chunk>>,
}

impl Chunk {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || AtomicU32::new(0));
        Self {
            slots: slots.into_boxed_slice(),
            published: AtomicUsize::new(0),
            next: OnceLock::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots safe to read, with acquire ordering.
    pub(crate) fn published(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    /// Release-publish slots `[0, count)`.
    ///
    /// `count` must not retreat; the writer only ever grows it.
    pub(crate) fn publish(&self, count: usize) {
        debug_assert!(count <= self.capacity());
        self.published.store(count, Ordering::Release);
    }

    /// Writer-side slot store. Relaxed: ordering comes from the publish.
    pub(crate) fn set_slot(&self, index: usize, value: u32) {
        self.slots[index].store(value, Ordering::Relaxed);
    }

    /// Reader-side slot load; only valid for `index < published()`.
    pub(crate) fn slot(&self, index: usize) -> u32 {
        self.slots[index].load(Ordering::Relaxed)
    }

    /// Successor chunk, if one has been linked.
    pub(crate) fn next(&self) -> Option<&Chunk> {
        self.next.get().map(|boxed| &**boxed)
    }

    /// Link the successor. The caller must have sealed this chunk first so
    /// that a reader following the link sees its final published size.
    pub(crate) fn link(&self, next: Box<Chunk>) -> &Chunk {
        debug_assert!(self.next.get().is_none(), "chunk already linked");
        self.next.get_or_init(move || next)
    }

    /// Detach the successor for iterative teardown.
    pub(crate) fn take_next(&mut self) -> Option<Box<Chunk>> {
        self.next.take()
    }
}
