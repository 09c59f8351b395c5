//! Shared string table with stable dense ids.
//!
//! Every string referenced from the event stream (thread names, scope
//! descriptors) is interned here once and addressed by its [`StringId`]
//! afterwards. The table serializes as one part of a chunk: the strings
//! concatenated in id order, each terminated by a zero byte.

use crate::error::Result;
use crate::output::{OutputBuffer, PartHeader};
use crate::types::StringId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;

/// Part discriminant for a serialized string table.
pub const STRING_TABLE_PART_TYPE: u32 = 0x30000;

#[derive(Default)]
struct Inner {
    strings: Vec<String>,
    index: HashMap<String, StringId>,
}

/// Append-only registry of interned strings.
///
/// Ids are dense starting at 0 and stable until [`clear`](Self::clear),
/// which invalidates every id handed out before it.
#[derive(Default)]
pub struct StringTable {
    inner: Mutex<Inner>,
}

impl StringTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `s`, interning it if unseen.
    ///
    /// Equal byte strings always map to the same id.
    pub fn intern(&self, s: &str) -> StringId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.index.get(s) {
            return id;
        }
        let id = StringId::new(inner.strings.len() as u32);
        inner.strings.push(s.to_string());
        inner.index.insert(s.to_string(), id);
        id
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().strings.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all strings and ids.
    ///
    /// The caller must ensure no event buffer still holds slots referencing
    /// ids from before the clear; saving such a buffer afterwards produces a
    /// trace whose ids do not resolve.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.strings.clear();
        inner.index.clear();
    }

    /// Take a consistent snapshot of the current contents.
    ///
    /// The snapshot is what a save serializes; sizing and writing both run
    /// against it, so strings interned after the snapshot cannot skew the
    /// part layout.
    #[must_use]
    pub fn snapshot(&self) -> StringTableSnapshot {
        let inner = self.inner.lock();
        StringTableSnapshot {
            strings: inner.strings.clone(),
        }
    }
}

/// Immutable copy of a [`StringTable`] taken for one save.
pub struct StringTableSnapshot {
    strings: Vec<String>,
}

impl StringTableSnapshot {
    /// Number of strings in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Fill in the part header for the serialized snapshot.
    pub fn populate_header(&self, header: &mut PartHeader) {
        let raw_length: usize = self.strings.iter().map(|s| s.len() + 1).sum();
        header.part_type = STRING_TABLE_PART_TYPE;
        header.offset = 0;
        header.length = raw_length as u32;
    }

    /// Write the payload: null-terminated strings in id order, then pad to
    /// the alignment boundary.
    pub fn write_to<W: Write>(
        &self,
        header: &PartHeader,
        out: &mut OutputBuffer<W>,
    ) -> Result<()> {
        debug_assert_eq!(
            header.length as usize,
            self.strings.iter().map(|s| s.len() + 1).sum::<usize>()
        );
        for s in &self.strings {
            out.append(s.as_bytes())?;
            out.append(&[0u8])?;
        }
        out.align()
    }
}
