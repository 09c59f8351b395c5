//! Chunked binary output encoding.
//!
//! A trace stream is a sequence of chunks. Each chunk carries a fixed
//! six-word header, one three-word header per part, then the concatenated
//! part payloads, each padded to the 4-byte alignment boundary:
//!
//! ```text
//! offset 0:  u32 id           (monotonic per writer)
//! offset 4:  u32 type         (1 = event snapshot)
//! offset 8:  u32 length       (total chunk bytes including this header)
//! offset 12: u32 start_time   (microseconds)
//! offset 16: u32 end_time
//! offset 20: u32 part_count
//! offset 24: part headers     (part_count x [type, offset, length])
//! then:      payloads, each 4-byte aligned
//! ```
//!
//! Part offsets are relative to the start of the payload region, not the
//! chunk. All integers are little-endian.

use crate::error::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Fixed size of the chunk header in bytes.
pub const CHUNK_HEADER_SIZE: u32 = 6 * 4;

/// Fixed size of one part header in bytes.
pub const PART_HEADER_SIZE: u32 = 3 * 4;

/// Payload alignment boundary in bytes.
pub const ALIGNMENT: u32 = 4;

/// Chunk `type` value for an event snapshot.
pub const CHUNK_TYPE_EVENTS: u32 = 1;

/// Round a length up to the next alignment boundary.
#[must_use]
pub const fn align_up(length: u32) -> u32 {
    let rem = length % ALIGNMENT;
    if rem == 0 {
        length
    } else {
        length + (ALIGNMENT - rem)
    }
}

/// Chunk header template supplied by the writer.
///
/// `length` and `part_count` are derived from the part array when the chunk
/// is started, so the template only carries the remaining fields.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    /// Monotonic chunk id, unique per writer.
    pub id: u32,
    /// Format discriminant; [`CHUNK_TYPE_EVENTS`] for event snapshots.
    pub chunk_type: u32,
    /// Earliest timestamp covered by the chunk, in microseconds.
    pub start_time: u32,
    /// Latest timestamp covered by the chunk, in microseconds.
    pub end_time: u32,
}

/// Header of one part within a chunk.
///
/// Participants fill `part_type` and `length` when their sizes are sampled;
/// `offset` is computed by [`OutputBuffer::start_chunk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartHeader {
    /// Part discriminant (string table, slot stream, ...).
    pub part_type: u32,
    /// Byte offset of the payload relative to the payload region.
    pub offset: u32,
    /// Unpadded payload length in bytes.
    pub length: u32,
}

/// Byte sink wrapper with aligned append and little-endian primitive writes.
///
/// Tracks its own write position and never seeks, so any `io::Write` works
/// as the sink. After [`start_chunk`](Self::start_chunk) returns, the caller
/// must write each part's payload in the order of the part array and end
/// every payload on an alignment boundary (via [`align`](Self::align)); the
/// buffer itself does not enforce the ordering.
pub struct OutputBuffer<W: Write> {
    sink: W,
    position: u64,
}

impl<W: Write> OutputBuffer<W> {
    /// Wrap a byte sink.
    pub fn new(sink: W) -> Self {
        Self { sink, position: 0 }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write one little-endian 32-bit word.
    pub fn append_u32(&mut self, value: u32) -> Result<()> {
        self.sink.write_u32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    /// Write raw bytes.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Pad with zero bytes until the write position is 4-byte aligned.
    pub fn align(&mut self) -> Result<()> {
        let rem = (self.position % u64::from(ALIGNMENT)) as u32;
        if rem != 0 {
            let pad = ALIGNMENT - rem;
            self.append(&[0u8; ALIGNMENT as usize][..pad as usize])?;
        }
        Ok(())
    }

    /// Compute the chunk layout and emit the chunk and part headers.
    ///
    /// Each part's `offset` is filled in relative to the payload region, and
    /// the total chunk length (headers plus aligned payloads) is returned.
    ///
    /// # Errors
    /// Fails only if the sink rejects a write.
    pub fn start_chunk(&mut self, header: ChunkHeader, parts: &mut [PartHeader]) -> Result<u32> {
        let mut chunk_length = CHUNK_HEADER_SIZE + parts.len() as u32 * PART_HEADER_SIZE;
        let mut part_offset = 0u32;
        for part in parts.iter_mut() {
            part.offset = part_offset;
            let aligned = align_up(part.length);
            chunk_length += aligned;
            part_offset += aligned;
        }

        self.append_u32(header.id)?;
        self.append_u32(header.chunk_type)?;
        self.append_u32(chunk_length)?;
        self.append_u32(header.start_time)?;
        self.append_u32(header.end_time)?;
        self.append_u32(parts.len() as u32)?;

        for part in parts.iter() {
            self.append_u32(part.part_type)?;
            self.append_u32(part.offset)?;
            self.append_u32(part.length)?;
        }

        Ok(chunk_length)
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Unwrap the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
