//! Torture harness: many producer threads against a periodic saver.
//!
//! Producers emit nested scopes and instantaneous events as fast as they
//! can while the saver snapshots the runtime on an interval, writing every
//! Nth snapshot to a trace file. Exits non-zero if any save fails.

use anyhow::{Context, Result};
use clap::Parser;
use shutter_core::{trace_event, trace_scope, Runtime};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Stress the tracing runtime with concurrent producers and savers.
#[derive(Parser)]
#[command(name = "shutter-stress")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of producer threads (defaults to available cores minus one)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Total number of saver iterations
    #[arg(short, long, default_value = "750")]
    saves: u32,

    /// Write every Nth snapshot to a file; others go to memory
    #[arg(long, default_value = "250")]
    file_every: u32,

    /// Delay between saver iterations in milliseconds
    #[arg(long, default_value = "10")]
    interval_ms: u64,

    /// Directory for emitted trace files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

fn producer_loop(runtime: &Runtime, thread_number: u32, stop: &AtomicBool) -> Result<()> {
    let handle = runtime
        .register_thread(&format!("noise-maker-{thread_number}"))
        .context("producer registration failed")?;

    let mut i = 0u32;
    loop {
        trace_event!(handle, "noise#loop: thread, i", thread_number, i);
        if i % 100 == 0 {
            let _s100 = trace_scope!(handle, "noise#scope100: thread, i", thread_number, i);
            if i % 400 == 0 {
                let _s400 = trace_scope!(handle, "noise#scope400: thread, i", thread_number, i);
                std::thread::sleep(Duration::from_micros(10));
            }
        }
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        i = i.wrapping_add(1);
    }
}

fn saver_loop(runtime: &Runtime, cli: &Cli) -> Result<()> {
    let handle = runtime.register_thread("save-thread")?;
    for i in 0..cli.saves {
        if i > 0 && i % cli.file_every == 0 {
            let _scope = trace_scope!(handle, "saver#to_file: i", i);
            let path = cli.out_dir.join(format!("torture_{i}.shutter-trace"));
            runtime
                .save_to_file(&path)
                .with_context(|| format!("save to {} failed", path.display()))?;
            info!(path = %path.display(), "wrote trace file");
        } else {
            let mut sink = Vec::new();
            runtime.save(&mut sink).context("in-memory save failed")?;
        }
        std::thread::sleep(Duration::from_millis(cli.interval_ms));
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let threads = cli.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(1)
    });

    let runtime = Runtime::global();
    let stop = Arc::new(AtomicBool::new(false));
    info!(threads, saves = cli.saves, "starting torture run");

    let mut producers = Vec::new();
    for thread_number in 0..threads as u32 {
        let stop = Arc::clone(&stop);
        producers.push(std::thread::spawn(move || {
            producer_loop(Runtime::global(), thread_number, &stop)
        }));
    }

    let result = saver_loop(runtime, &cli);
    stop.store(true, Ordering::Relaxed);

    for producer in producers {
        match producer.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(%err, "producer failed"),
            Err(_) => anyhow::bail!("producer panicked"),
        }
    }

    result
}
