//! Per-thread append-only event buffers.
//!
//! An [`EventBuffer`] is a singly linked chain of fixed-capacity slot
//! chunks with exactly one writer (the owning producer thread) and any
//! number of concurrent readers (savers). The writer's fast path is plain
//! arithmetic on a private cursor; the only cross-thread communication is
//! a release store of each chunk's published slot count and of the link to
//! a successor chunk, matched by acquire loads on the reader side.
//!
//! Chunks are never reclaimed while the buffer is alive, so readers can
//! walk the chain without coordination beyond the publish protocol.

mod chunk;

use crate::error::Result;
use crate::output::{OutputBuffer, PartHeader};
use chunk::Chunk;
use std::io::Write;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Part discriminant for a serialized slot stream.
pub const EVENT_STREAM_PART_TYPE: u32 = 0x20002;

/// Default chunk capacity in slots (16 KiB of payload).
pub const DEFAULT_CHUNK_SLOTS: usize = 4096;

/// Writer-private cursor: the tail chunk and how many of its slots are
/// reserved. Stored as atomics only so the buffer stays `Sync`; every
/// access is relaxed and comes from the single owning thread.
struct WriterCursor {
    current: AtomicPtr<Chunk>,
    used: AtomicUsize,
}

/// Append-only chain of slot chunks owned by one producer.
pub struct EventBuffer {
    head: Box<Chunk>,
    chunk_limit: usize,
    cursor: WriterCursor,
}

impl EventBuffer {
    /// Create a buffer whose chunks hold `chunk_limit` slots.
    pub(crate) fn new(chunk_limit: usize) -> Self {
        let chunk_limit = chunk_limit.max(1);
        let head = Box::new(Chunk::new(chunk_limit));
        let head_ptr = &*head as *const Chunk as *mut Chunk;
        Self {
            head,
            chunk_limit,
            cursor: WriterCursor {
                current: AtomicPtr::new(head_ptr),
                used: AtomicUsize::new(0),
            },
        }
    }

    fn current(&self) -> &Chunk {
        let ptr = self.cursor.current.load(Ordering::Relaxed);
        // SAFETY: the cursor always points at a chunk inside the chain
        // rooted at `self.head`, and chunks live as long as the buffer.
        unsafe { &*ptr }
    }

    /// Reserve `count` contiguous slots for the owning writer.
    ///
    /// Requests larger than the chunk limit are honored with a dedicated
    /// chunk of exactly `count` slots; the chain returns to the configured
    /// limit at the next expansion.
    pub(crate) fn reserve(&self, count: usize) -> SlotReservation<'_> {
        let current = self.current();
        let used = self.cursor.used.load(Ordering::Relaxed);
        if used + count <= current.capacity() {
            self.cursor.used.store(used + count, Ordering::Relaxed);
            return SlotReservation {
                chunk: current,
                start: used,
                len: count,
            };
        }
        self.expand(current, used, count)
    }

    /// Slow path: seal the tail chunk and link a fresh one holding the
    /// new reservation at its start.
    fn expand<'a>(
        &'a self,
        current: &'a Chunk,
        used: usize,
        count: usize,
    ) -> SlotReservation<'a> {
        let capacity = count.max(self.chunk_limit);
        let fresh = Box::new(Chunk::new(capacity));

        // Seal before linking: a reader that follows the new link must
        // already see the old chunk's final published size.
        current.publish(used);
        let linked = current.link(fresh);

        self.cursor
            .current
            .store(linked as *const Chunk as *mut Chunk, Ordering::Relaxed);
        self.cursor.used.store(count, Ordering::Relaxed);

        SlotReservation {
            chunk: linked,
            start: 0,
            len: count,
        }
    }

    /// Total published slots across the chain.
    #[must_use]
    pub fn published_slots(&self) -> usize {
        let mut total = 0;
        let mut chunk = Some(&*self.head);
        while let Some(c) = chunk {
            total += c.published();
            chunk = c.next();
        }
        total
    }

    /// Number of chunks in the chain.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        let mut count = 0;
        let mut chunk = Some(&*self.head);
        while let Some(c) = chunk {
            count += 1;
            chunk = c.next();
        }
        count
    }

    /// Sample the published slot count and fill in the part header.
    pub(crate) fn populate_header(&self, header: &mut PartHeader) {
        header.part_type = EVENT_STREAM_PART_TYPE;
        header.offset = 0;
        header.length = (self.published_slots() * 4) as u32;
    }

    /// Write the payload for a previously sampled header.
    ///
    /// The walk is driven by `header.length`, never by fresh totals: each
    /// chunk contributes `min(remaining, published)` slots, so the output
    /// cannot exceed the sampled size even though producers kept running.
    /// Returns the bytes actually produced; fewer than declared means the
    /// chain ran dry and the chunk being written is corrupt.
    pub(crate) fn write_to<W: Write>(
        &self,
        header: &PartHeader,
        out: &mut OutputBuffer<W>,
    ) -> Result<u32> {
        let mut remaining = (header.length / 4) as usize;
        let mut chunk = Some(&*self.head);
        while remaining > 0 {
            let Some(c) = chunk else { break };
            let take = remaining.min(c.published());
            for i in 0..take {
                out.append_u32(c.slot(i))?;
            }
            remaining -= take;
            chunk = c.next();
        }
        Ok(header.length - (remaining * 4) as u32)
    }
}

impl Drop for EventBuffer {
    fn drop(&mut self) {
        // Unlink iteratively so a long chain cannot overflow the stack
        // through nested box drops.
        let mut next = self.head.take_next();
        while let Some(mut c) = next {
            next = c.take_next();
        }
    }
}

/// A run of reserved slots handed to the writer.
///
/// Slots default to zero; the writer fills them with [`set`](Self::set)
/// and the run is release-published when the reservation drops. A
/// reservation must be dropped before the owning thread reserves again,
/// which the emit layer guarantees by construction.
pub struct SlotReservation<'a> {
    chunk: &'a Chunk,
    start: usize,
    len: usize,
}

impl SlotReservation<'_> {
    /// Number of reserved slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the reservation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store a slot value at `index` within the reservation.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: u32) {
        assert!(index < self.len, "slot index {} out of {}", index, self.len);
        self.chunk.set_slot(self.start + index, value);
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        self.chunk.publish(self.start + self.len);
    }
}
