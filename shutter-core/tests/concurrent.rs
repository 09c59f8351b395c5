//! Concurrency scenarios: saves racing producers and each other.

mod common;

use common::{parse_events, DecodedChunk};
use shutter_core::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn save_and_decode(runtime: &Runtime) -> DecodedChunk {
    let mut sink = Vec::new();
    runtime.save(&mut sink).unwrap();
    let chunk = DecodedChunk::parse(&sink);
    chunk.assert_well_formed();
    chunk
}

#[test]
fn successive_snapshots_grow_by_prefix() {
    let clock = Arc::new(ManualClock::at(0));
    let runtime = Runtime::with_config(RuntimeConfig {
        chunk_slots: 16,
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
    });
    let handle = runtime.register_thread("T").unwrap();
    let scope = ScopeId::new(runtime.strings().intern("step"));

    handle.instant(scope, &[]);
    handle.instant(scope, &[]);
    let first = save_and_decode(&runtime);

    clock.advance(Duration::from_micros(3));
    for _ in 0..6 {
        handle.instant(scope, &[]);
    }
    let second = save_and_decode(&runtime);

    let s1 = &first.slot_streams()[0];
    let s2 = &second.slot_streams()[0];
    assert!(s1.len() <= s2.len());
    assert_eq!(&s2[..s1.len()], &s1[..], "earlier snapshot is not a prefix");
}

#[test]
fn saves_race_an_active_producer() {
    let runtime = Arc::new(Runtime::with_config(RuntimeConfig {
        chunk_slots: 32,
        clock: Arc::new(MonotonicClock::new()),
    }));
    let stop = Arc::new(AtomicBool::new(false));

    let producer = {
        let runtime = Arc::clone(&runtime);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let handle = runtime.register_thread("producer").unwrap();
            let scope = ScopeId::new(runtime.strings().intern("spin: i"));
            let mut count = 0u32;
            while !stop.load(Ordering::Relaxed) {
                handle.instant(scope, &[count.into()]);
                count += 1;
            }
            count
        })
    };

    // Every intermediate snapshot must be well formed and cut on an event
    // boundary: publication happens per whole reservation.
    let mut last_len = 0;
    for _ in 0..50 {
        let chunk = save_and_decode(&runtime);
        for stream in chunk.slot_streams() {
            let events = parse_events(&stream);
            assert!(stream.len() % 4 == 0, "4-slot events always");
            assert!(events.len() * 4 == stream.len());
            assert!(stream.len() >= last_len);
            last_len = stream.len();
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    stop.store(true, Ordering::Relaxed);
    let emitted = producer.join().unwrap();

    let final_chunk = save_and_decode(&runtime);
    let events = parse_events(&final_chunk.slot_streams()[0]);
    assert_eq!(events.len() as u32, emitted);

    let args: Vec<u32> = events.iter().map(|e| e.args[0]).collect();
    let expected: Vec<u32> = (0..emitted).collect();
    assert_eq!(args, expected, "events must appear in program order");
}

#[test]
fn concurrent_savers_each_get_a_consistent_chunk() {
    let runtime = Arc::new(Runtime::with_config(RuntimeConfig {
        chunk_slots: 32,
        clock: Arc::new(MonotonicClock::new()),
    }));
    let stop = Arc::new(AtomicBool::new(false));

    let mut producers = Vec::new();
    for t in 0..2 {
        let runtime = Arc::clone(&runtime);
        let stop = Arc::clone(&stop);
        producers.push(std::thread::spawn(move || {
            let handle = runtime.register_thread(&format!("producer-{t}")).unwrap();
            let scope = ScopeId::new(runtime.strings().intern("work"));
            while !stop.load(Ordering::Relaxed) {
                let _guard = trace_scope!(handle, "noise#loop");
                handle.instant(scope, &[]);
            }
        }));
    }

    let mut savers = Vec::new();
    for _ in 0..2 {
        let runtime = Arc::clone(&runtime);
        savers.push(std::thread::spawn(move || {
            for _ in 0..30 {
                let mut sink = Vec::new();
                runtime.save(&mut sink).unwrap();
                let chunk = DecodedChunk::parse(&sink);
                chunk.assert_well_formed();
                for stream in chunk.slot_streams() {
                    parse_events(&stream);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }));
    }

    for saver in savers {
        saver.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for producer in producers {
        producer.join().unwrap();
    }
}

#[test]
fn torture_many_producers_one_saver() {
    const PRODUCERS: usize = 4;
    const EVENTS_PER_PRODUCER: u32 = 5_000;

    let runtime = Arc::new(Runtime::with_config(RuntimeConfig {
        chunk_slots: 256,
        clock: Arc::new(MonotonicClock::new()),
    }));
    let stop = Arc::new(AtomicBool::new(false));

    let saver = {
        let runtime = Arc::clone(&runtime);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut saves = 0u32;
            while !stop.load(Ordering::Relaxed) {
                let chunk = save_and_decode(&runtime);
                for stream in chunk.slot_streams() {
                    parse_events(&stream);
                }
                saves += 1;
                std::thread::sleep(Duration::from_millis(2));
            }
            saves
        })
    };

    let mut producers = Vec::new();
    for t in 0..PRODUCERS {
        let runtime = Arc::clone(&runtime);
        producers.push(std::thread::spawn(move || {
            let handle = runtime
                .register_thread(&format!("noise-{t}"))
                .unwrap();
            for i in 0..EVENTS_PER_PRODUCER {
                trace_event!(handle, "noise#event: thread, i", t as u32, i);
                if i % 100 == 0 {
                    let _guard =
                        trace_scope!(handle, "noise#century: thread, i", t as u32, i);
                }
            }
        }));
    }

    for producer in producers {
        producer.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    let saves = saver.join().unwrap();
    assert!(saves > 0);

    let chunk = save_and_decode(&runtime);
    let streams = chunk.slot_streams();
    assert_eq!(streams.len(), PRODUCERS);

    for stream in &streams {
        let events = parse_events(stream);
        // 5 slots per instant (two u32 args), 8 per scope pair.
        let centuries = u64::from(EVENTS_PER_PRODUCER).div_ceil(100);
        let expected =
            u64::from(EVENTS_PER_PRODUCER) * 5 + centuries * 8;
        assert_eq!(stream.len() as u64, expected);

        let mut last = 0u64;
        for event in &events {
            assert!(event.timestamp_us >= last, "timestamps went backwards");
            last = event.timestamp_us;
        }
    }
}
