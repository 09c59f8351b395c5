//! Process-wide registry of event buffers and save orchestration.
//!
//! A [`Runtime`] owns the string table and one [`EventBuffer`] per
//! registered producer thread. Producer threads register once and then
//! emit through their [`ThreadHandle`]; any thread may call
//! [`save`](Runtime::save) at any time to snapshot everything captured so
//! far into one chunk. Saves never block producers.

use crate::buffer::{EventBuffer, SlotReservation, DEFAULT_CHUNK_SLOTS};
use crate::clock::{Clock, MonotonicClock};
use crate::error::{Result, TraceError};
use crate::output::{ChunkHeader, OutputBuffer, PartHeader, CHUNK_TYPE_EVENTS};
use crate::strings::StringTable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use tracing::debug;

/// Construction options for a [`Runtime`].
pub struct RuntimeConfig {
    /// Capacity of each event-buffer chunk, in slots.
    pub chunk_slots: usize,
    /// Monotonic microsecond clock used to timestamp events and chunks.
    pub clock: Arc<dyn Clock>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_slots: DEFAULT_CHUNK_SLOTS,
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("chunk_slots", &self.chunk_slots)
            .finish_non_exhaustive()
    }
}

struct RegisteredBuffer {
    name: String,
    buffer: Arc<EventBuffer>,
}

#[derive(Default)]
struct Registry {
    by_thread: HashMap<ThreadId, usize>,
    buffers: Vec<RegisteredBuffer>,
}

/// Process-wide tracing runtime.
pub struct Runtime {
    strings: Arc<StringTable>,
    clock: Arc<dyn Clock>,
    chunk_slots: usize,
    registry: Mutex<Registry>,
    next_chunk_id: AtomicU32,
}

impl Runtime {
    /// Create a runtime with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime from explicit configuration.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            strings: Arc::new(StringTable::new()),
            clock: config.clock,
            chunk_slots: config.chunk_slots,
            registry: Mutex::new(Registry::default()),
            next_chunk_id: AtomicU32::new(0),
        }
    }

    /// The process-wide shared instance, created on first use.
    ///
    /// Convenient for macro call sites spread across a program; code that
    /// wants its own lifecycle (or a test clock) constructs runtimes
    /// explicitly instead.
    pub fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        GLOBAL.get_or_init(Runtime::new)
    }

    /// The runtime's string table.
    #[must_use]
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// The runtime's clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Number of registered producer threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.registry.lock().buffers.len()
    }

    /// Register the calling thread as a producer under `name`.
    ///
    /// The first call from a thread allocates its event buffer and interns
    /// the name; later calls from the same thread return a handle to the
    /// same buffer. The handle is pinned to the registering thread.
    ///
    /// # Errors
    /// [`TraceError::ReregisterConflict`] if this thread is already
    /// registered under a different name. The registry is left unchanged.
    pub fn register_thread(&self, name: &str) -> Result<ThreadHandle> {
        let thread_id = std::thread::current().id();
        let mut registry = self.registry.lock();

        if let Some(&index) = registry.by_thread.get(&thread_id) {
            let entry = &registry.buffers[index];
            if entry.name != name {
                return Err(TraceError::ReregisterConflict {
                    existing: entry.name.clone(),
                    requested: name.to_string(),
                });
            }
            return Ok(self.handle_for(Arc::clone(&entry.buffer)));
        }

        self.strings.intern(name);
        let buffer = Arc::new(EventBuffer::new(self.chunk_slots));
        let index = registry.buffers.len();
        registry.by_thread.insert(thread_id, index);
        registry.buffers.push(RegisteredBuffer {
            name: name.to_string(),
            buffer: Arc::clone(&buffer),
        });
        debug!(thread = name, "registered producer thread");

        Ok(self.handle_for(buffer))
    }

    fn handle_for(&self, buffer: Arc<EventBuffer>) -> ThreadHandle {
        ThreadHandle {
            buffer,
            strings: Arc::clone(&self.strings),
            clock: Arc::clone(&self.clock),
            _pinned: PhantomData,
        }
    }

    /// Snapshot everything captured so far into one chunk on `sink`.
    ///
    /// Parts are emitted in registration order behind the string table.
    /// Producers keep running during the save; events published after the
    /// size sampling appear in a later snapshot. Multiple saves may run
    /// concurrently, each against its own sink.
    ///
    /// # Errors
    /// [`TraceError::SinkWrite`] if the sink rejects a write, or
    /// [`TraceError::SizeMismatch`] if a buffer cannot produce the bytes
    /// its sampled header declared (the output must then be discarded).
    pub fn save<W: Write>(&self, sink: W) -> Result<()> {
        let start_time = self.clock.now_micros() as u32;

        let participants: Vec<(String, Arc<EventBuffer>)> = {
            let registry = self.registry.lock();
            registry
                .buffers
                .iter()
                .map(|entry| (entry.name.clone(), Arc::clone(&entry.buffer)))
                .collect()
        };

        // Sample buffers before snapshotting strings: a slot published by
        // now can only reference a string interned before it, so every id
        // the sampled slots carry resolves in the snapshot below.
        let mut parts = vec![PartHeader::default(); participants.len() + 1];
        for (i, (_, buffer)) in participants.iter().enumerate() {
            buffer.populate_header(&mut parts[i + 1]);
        }
        let strings = self.strings.snapshot();
        strings.populate_header(&mut parts[0]);
        let end_time = self.clock.now_micros() as u32;

        let id = self.next_chunk_id.fetch_add(1, Ordering::Relaxed);
        let mut out = OutputBuffer::new(sink);
        let chunk_length = out.start_chunk(
            ChunkHeader {
                id,
                chunk_type: CHUNK_TYPE_EVENTS,
                start_time,
                end_time,
            },
            &mut parts,
        )?;

        strings.write_to(&parts[0], &mut out)?;
        for (i, (name, buffer)) in participants.iter().enumerate() {
            let header = &parts[i + 1];
            let produced = buffer.write_to(header, &mut out)?;
            if produced < header.length {
                return Err(TraceError::SizeMismatch {
                    part: name.clone(),
                    declared: header.length,
                    produced,
                });
            }
        }
        out.flush()?;

        debug!(
            chunk = id,
            bytes = chunk_length,
            parts = parts.len(),
            "saved trace chunk"
        );
        Ok(())
    }

    /// Save a snapshot to a freshly created file.
    ///
    /// # Errors
    /// Same failure modes as [`save`](Runtime::save); file creation errors
    /// surface as [`TraceError::SinkWrite`].
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Discard everything: all interned strings and all event buffers.
    ///
    /// This is a whole-process operation. Outstanding handles keep writing
    /// safely into buffers that no longer appear in saves, and every cached
    /// scope id (including `ScopeSite` caches) becomes stale; threads must
    /// re-register and re-intern to produce meaningful traces again.
    pub fn reset(&self) {
        let mut registry = self.registry.lock();
        registry.by_thread.clear();
        registry.buffers.clear();
        self.strings.clear();
        debug!("runtime reset");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("chunk_slots", &self.chunk_slots)
            .field("threads", &self.thread_count())
            .field("strings", &self.strings.len())
            .finish_non_exhaustive()
    }
}

/// Producer-side handle to the calling thread's event buffer.
///
/// Handles are neither `Send` nor `Sync`: all writes to a buffer must come
/// from the thread that registered it, which is what makes the reservation
/// fast path safe without atomics.
pub struct ThreadHandle {
    pub(crate) buffer: Arc<EventBuffer>,
    pub(crate) strings: Arc<StringTable>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) _pinned: PhantomData<*const ()>,
}

impl ThreadHandle {
    /// Reserve `count` slots on this thread's buffer.
    ///
    /// The reservation publishes when dropped and must be dropped before
    /// the next reservation on this buffer. The emit methods in
    /// [`crate::event`] wrap this with the standard slot conventions.
    pub fn reserve(&self, count: usize) -> SlotReservation<'_> {
        self.buffer.reserve(count)
    }

    /// Read-only view of the underlying buffer.
    #[must_use]
    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("published_slots", &self.buffer.published_slots())
            .finish_non_exhaustive()
    }
}
