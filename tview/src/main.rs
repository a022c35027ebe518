//! # tview - Main Entry Point
//!
//! Two subcommands:
//! - **inspect** (`tview inspect trace.tview`): decode, reconstruct and print a trace
//! - **demo** (`tview demo out.tview`): record a small lock-contention workload

// Report output converts nanosecond counters to f64 for display
#![allow(clippy::cast_precision_loss, clippy::too_many_lines)]

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration as StdDuration;

use tview::analysis::analyze_contention;
use tview::capture::{CaptureConfig, CaptureSession, Recorder};
use tview::cli::{Args, Command};
use tview::domain::{CaptureError, FormatError, SyncId, ThreadId};
use tview::export::ChromeTraceExporter;
use tview::format::{decode_with_stats, SyncKind, Trace};
use tview::query::Inspector;
use tview::timeline::{reconstruct, reconstruct_strict, Timeline};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_BAD_TRACE: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.downcast_ref::<FormatError>().is_some()) {
        EXIT_BAD_TRACE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Inspect { trace, thread, strict, export } => {
            inspect(&trace, thread.map(ThreadId), strict, export.as_deref(), args.quiet)
        }
        Command::Demo { output, threads, iterations, capture } => {
            demo(&output, threads, iterations, &capture, args.quiet)
        }
    }
}

fn inspect(path: &Path, only: Option<ThreadId>, strict: bool, export: Option<&Path>, quiet: bool) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (trace, stats) = decode_with_stats(&bytes).with_context(|| format!("Failed to decode {}", path.display()))?;
    debug!("Decoded {} records, skipped {}", stats.events_decoded, stats.events_skipped);

    let timeline = if strict { reconstruct_strict(&trace)? } else { reconstruct(&trace) };

    if !quiet {
        print_header(path, &trace, &timeline);
    }
    print_threads(&trace, &timeline, only)?;
    if !quiet {
        print_contention(&trace, &timeline);
        print_violations(&timeline);
    }

    if let Some(export_path) = export {
        let mut exporter = ChromeTraceExporter::new();
        exporter.add_timeline(&trace, &timeline);
        exporter
            .export_file(export_path)
            .with_context(|| format!("Failed to export to {}", export_path.display()))?;
        info!("Exported {} events to {}", exporter.event_count(), export_path.display());
        if !quiet {
            println!("\nChrome trace written to {}", export_path.display());
        }
    }
    Ok(())
}

fn print_header(path: &Path, trace: &Trace, timeline: &Timeline) {
    let header = &trace.header;
    println!("Trace: {}", path.display());
    println!(
        "  format v{}, {} threads, {} sync objects, {} events, {} dropped",
        header.version, header.num_threads, header.num_sync_objects, header.num_events, header.dropped_events
    );
    println!("  span {} .. {} ({})", timeline.start, timeline.end, timeline.end.since(timeline.start));
}

fn print_threads(trace: &Trace, timeline: &Timeline, only: Option<ThreadId>) -> Result<()> {
    let inspector = Inspector::new(trace);
    let mut shown = 0;
    for lane in timeline.lanes.iter().filter(|lane| only.map_or(true, |t| t == lane.thread)) {
        shown += 1;
        println!("\n{} \"{}\"", lane.thread, inspector.thread_name(lane.thread));
        for segment in &lane.segments {
            let details = inspector.describe(segment)?;
            let marker = if segment.synthesized { "*" } else { " " };
            println!(" {marker}{details}");
        }
    }
    if let Some(thread) = only.filter(|_| shown == 0) {
        return Err(anyhow!("Thread {thread} does not appear in the trace"));
    }
    Ok(())
}

fn print_contention(trace: &Trace, timeline: &Timeline) {
    let hotspots = analyze_contention(timeline);
    if hotspots.is_empty() {
        return;
    }
    let inspector = Inspector::new(trace);
    let total: u64 = hotspots.iter().map(|h| h.total_blocked.0).sum();
    println!("\nCONTENTION (total blocked {})", tview::domain::Duration(total));
    for hotspot in hotspots {
        let name = inspector.sync_name(hotspot.object).unwrap_or("<unknown>");
        println!(
            "  {name:<24} {:>5} waits  {:>10} total  {:>10} max  {:>5.1}%",
            hotspot.waits,
            hotspot.total_blocked.to_string(),
            hotspot.max_blocked.to_string(),
            hotspot.percentage
        );
    }
}

fn print_violations(timeline: &Timeline) {
    if timeline.violations.is_empty() {
        return;
    }
    println!("\nREPAIRED SEQUENCES ({}, marked * above)", timeline.violations.len());
    for violation in &timeline.violations {
        println!("  {violation}");
    }
}

/// Workers take turns on one shared lock; the main thread waits for all of them.
fn demo(output: &Path, threads: u32, iterations: u32, capture: &str, quiet: bool) -> Result<()> {
    let mut config = CaptureConfig::from_agent_args(capture)?;
    config.output = output.to_path_buf();

    let session = CaptureSession::start_file(config)?;
    let recorder = session.recorder();
    let main_thread = ThreadId(1);
    recorder.on_thread_start(main_thread, "main")?;

    let counter = Arc::new(Mutex::new(0u64));
    let lock_id = SyncId(Arc::as_ptr(&counter) as usize as u64);
    let done_id = SyncId(lock_id.0 + 1);

    let handles: Vec<_> = (0..threads)
        .map(|n| {
            let recorder = recorder.clone();
            let counter = Arc::clone(&counter);
            let thread = ThreadId(n + 2);
            thread::Builder::new()
                .name(format!("demo-worker-{n}"))
                .spawn(move || worker(&recorder, thread, &counter, lock_id, done_id, iterations))
        })
        .collect::<std::io::Result<_>>()?;

    recorder.declare_sync(done_id, SyncKind::Monitor, "workers-done")?;
    recorder.on_wait(main_thread, done_id, 0)?;
    for handle in handles {
        handle.join().map_err(|_| anyhow!("demo worker panicked"))??;
    }
    recorder.on_lock_acquired(main_thread, done_id, "workers-done")?;
    recorder.on_annotation(main_thread, "all workers joined")?;
    recorder.on_thread_end(main_thread)?;

    let summary = session.stop()?;
    if !quiet {
        println!(
            "Wrote {}: {} events ({} dropped), {} threads, {} sync objects",
            output.display(),
            summary.events_written,
            summary.events_dropped,
            summary.threads,
            summary.sync_objects
        );
    }
    Ok(())
}

fn worker(
    recorder: &Recorder,
    thread: ThreadId,
    counter: &Mutex<u64>,
    lock_id: SyncId,
    done_id: SyncId,
    iterations: u32,
) -> Result<(), CaptureError> {
    recorder.on_thread_start(thread, &format!("worker-{}", thread.0 - 1))?;

    for i in 0..iterations {
        recorder.on_lock_attempt(thread, lock_id, "shared-counter")?;
        let mut guard = counter.lock().unwrap_or_else(PoisonError::into_inner);
        recorder.on_lock_acquired(thread, lock_id, "shared-counter")?;
        *guard += 1;
        thread::sleep(StdDuration::from_micros(50));
        recorder.on_unlock(thread, lock_id, "shared-counter")?;
        drop(guard);

        if i % 10 == 0 {
            recorder.on_annotation(thread, &format!("iteration {i}"))?;
        }
        if i % 5 == 4 {
            let nap = StdDuration::from_micros(200);
            recorder.on_sleep(thread, u64::try_from(nap.as_nanos()).unwrap_or(u64::MAX))?;
            thread::sleep(nap);
            recorder.on_sleep_end(thread)?;
        }
    }

    recorder.on_io(thread, "write", "demo.log")?;
    thread::sleep(StdDuration::from_micros(100));
    recorder.on_io_end(thread)?;

    recorder.on_notify(thread, done_id)?;
    recorder.on_thread_end(thread)
}
