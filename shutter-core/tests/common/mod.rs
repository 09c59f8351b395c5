//! Shared helpers: decoding saved chunks back into structured form.

#![allow(dead_code)]

use byteorder::{LittleEndian, ReadBytesExt};
use shutter_core::event::{ControlWord, EventKind};
use shutter_core::types::ScopeId;
use std::io::Cursor;

pub const STRING_TABLE_PART: u32 = 0x30000;
pub const EVENT_STREAM_PART: u32 = 0x20002;

/// One part of a decoded chunk, payload still raw.
#[derive(Debug)]
pub struct DecodedPart {
    pub part_type: u32,
    pub offset: u32,
    pub length: u32,
    pub payload: Vec<u8>,
}

/// A chunk parsed back from its serialized form.
#[derive(Debug)]
pub struct DecodedChunk {
    pub id: u32,
    pub chunk_type: u32,
    pub length: u32,
    pub start_time: u32,
    pub end_time: u32,
    pub parts: Vec<DecodedPart>,
}

impl DecodedChunk {
    /// Parse one chunk from the front of `bytes`.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut cursor = Cursor::new(bytes);
        let id = cursor.read_u32::<LittleEndian>().unwrap();
        let chunk_type = cursor.read_u32::<LittleEndian>().unwrap();
        let length = cursor.read_u32::<LittleEndian>().unwrap();
        let start_time = cursor.read_u32::<LittleEndian>().unwrap();
        let end_time = cursor.read_u32::<LittleEndian>().unwrap();
        let part_count = cursor.read_u32::<LittleEndian>().unwrap();

        let mut headers = Vec::new();
        for _ in 0..part_count {
            let part_type = cursor.read_u32::<LittleEndian>().unwrap();
            let offset = cursor.read_u32::<LittleEndian>().unwrap();
            let part_length = cursor.read_u32::<LittleEndian>().unwrap();
            headers.push((part_type, offset, part_length));
        }

        let payload_base = (24 + 12 * part_count) as usize;
        let parts = headers
            .into_iter()
            .map(|(part_type, offset, part_length)| {
                let start = payload_base + offset as usize;
                let end = start + part_length as usize;
                DecodedPart {
                    part_type,
                    offset,
                    length: part_length,
                    payload: bytes[start..end].to_vec(),
                }
            })
            .collect();

        Self {
            id,
            chunk_type,
            length,
            start_time,
            end_time,
            parts,
        }
    }

    /// The string-table part split into its strings.
    pub fn strings(&self) -> Vec<String> {
        let part = self
            .parts
            .iter()
            .find(|p| p.part_type == STRING_TABLE_PART)
            .expect("chunk has no string table part");
        part.payload
            .split(|&b| b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8(s.to_vec()).unwrap())
            .collect()
    }

    /// Slot streams in part order.
    pub fn slot_streams(&self) -> Vec<Vec<u32>> {
        self.parts
            .iter()
            .filter(|p| p.part_type == EVENT_STREAM_PART)
            .map(|p| {
                p.payload
                    .chunks_exact(4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect()
    }

    /// Check the layout laws: aligned part offsets and a chunk length that
    /// accounts for every aligned payload.
    pub fn assert_well_formed(&self) {
        let mut padded_total = 0u32;
        for part in &self.parts {
            assert_eq!(part.offset % 4, 0, "part offset not aligned");
            assert_eq!(part.offset, padded_total, "parts not densely packed");
            padded_total += part.length.div_ceil(4) * 4;
        }
        assert_eq!(
            self.length,
            24 + 12 * self.parts.len() as u32 + padded_total,
            "chunk length does not match layout"
        );
        assert!(self.start_time <= self.end_time);
    }
}

/// One event parsed from a slot stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub kind: EventKind,
    pub scope: ScopeId,
    pub timestamp_us: u64,
    pub args: Vec<u32>,
}

/// Parse a slot stream into events.
pub fn parse_events(slots: &[u32]) -> Vec<DecodedEvent> {
    let mut events = Vec::new();
    let mut at = 0;
    while at < slots.len() {
        let control = ControlWord::from_raw(slots[at]);
        let kind = control.kind().expect("invalid control word");
        let arg_slots = control.arg_slots();
        let end = at + 3 + arg_slots;
        assert!(end <= slots.len(), "truncated event in slot stream");

        let timestamp_us = u64::from(slots[at + 1]) | (u64::from(slots[at + 2]) << 32);
        events.push(DecodedEvent {
            kind,
            scope: control.scope(),
            timestamp_us,
            args: slots[at + 3..end].to_vec(),
        });
        at = end;
    }
    events
}
