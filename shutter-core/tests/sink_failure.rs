//! Failing-sink behavior: a broken save must not poison the runtime.

mod common;

use common::{parse_events, DecodedChunk};
use shutter_core::prelude::*;
use std::io::{self, Write};
use std::sync::Arc;

/// Sink that rejects the Nth write call.
struct FailingSink {
    writes: usize,
    fail_at: usize,
}

impl FailingSink {
    fn new(fail_at: usize) -> Self {
        Self {
            writes: 0,
            fail_at,
        }
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        if self.writes >= self.fail_at {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink exploded"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn populated_runtime() -> Runtime {
    let runtime = Runtime::with_config(RuntimeConfig {
        chunk_slots: 16,
        clock: Arc::new(ManualClock::at(50)),
    });
    let handle = runtime.register_thread("T").unwrap();
    let scope = ScopeId::new(runtime.strings().intern("op"));
    for _ in 0..5 {
        handle.instant(scope, &[]);
    }
    runtime
}

#[test]
fn sink_failure_surfaces_as_sink_write() {
    let runtime = populated_runtime();

    for fail_at in [1, 3, 8] {
        let err = runtime.save(FailingSink::new(fail_at)).unwrap_err();
        assert!(matches!(err, TraceError::SinkWrite(_)), "got {err}");
    }
}

#[test]
fn a_fresh_save_after_failure_is_complete() {
    let runtime = populated_runtime();

    let err = runtime.save(FailingSink::new(2)).unwrap_err();
    assert!(matches!(err, TraceError::SinkWrite(_)));

    let mut sink = Vec::new();
    runtime.save(&mut sink).unwrap();
    let chunk = DecodedChunk::parse(&sink);
    chunk.assert_well_formed();

    let events = parse_events(&chunk.slot_streams()[0]);
    assert_eq!(events.len(), 5);
    for event in &events {
        assert_eq!(event.timestamp_us, 50);
    }
}

#[test]
fn producing_stays_safe_after_a_failed_save() {
    let runtime = populated_runtime();
    let _ = runtime.save(FailingSink::new(1)).unwrap_err();

    // Same thread, same name: registration still resolves to the buffer.
    let handle = runtime.register_thread("T").unwrap();
    let scope = ScopeId::new(runtime.strings().intern("op"));
    handle.instant(scope, &[]);

    let mut sink = Vec::new();
    runtime.save(&mut sink).unwrap();
    let chunk = DecodedChunk::parse(&sink);
    assert_eq!(parse_events(&chunk.slot_streams()[0]).len(), 6);
}
