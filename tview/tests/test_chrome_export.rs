use tview::capture::{CaptureConfig, CaptureSession};
use tview::domain::{SyncId, ThreadId};
use tview::export::{ChromeTrace, ChromeTraceExporter};
use tview::format::decode;
use tview::timeline::reconstruct;

use std::io::Cursor;

#[test]
fn test_export_creates_valid_json() {
    let session = CaptureSession::start(Cursor::new(Vec::new()), CaptureConfig::default()).unwrap();
    let recorder = session.recorder();
    let (t1, lock) = (ThreadId(1), SyncId(0x99));

    recorder.on_thread_start(t1, "main").unwrap();
    recorder.on_lock_attempt(t1, lock, "config-lock").unwrap();
    recorder.on_lock_acquired(t1, lock, "config-lock").unwrap();
    recorder.on_annotation(t1, "reloaded").unwrap();
    recorder.on_unlock(t1, lock, "config-lock").unwrap();
    recorder.on_thread_end(t1).unwrap();
    let (_, sink) = session.stop_into_inner().unwrap();

    let trace = decode(sink.get_ref()).unwrap();
    let timeline = reconstruct(&trace);
    let mut exporter = ChromeTraceExporter::new();
    exporter.add_timeline(&trace, &timeline);
    assert_eq!(exporter.event_count(), timeline.segment_count());

    let mut buffer = Vec::new();
    exporter.export(&mut buffer).expect("Failed to export trace");

    // Verify the output is valid JSON with the expected structure
    let json_str = String::from_utf8(buffer).expect("Invalid UTF-8");
    let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("Invalid JSON");
    assert!(parsed.get("traceEvents").is_some());
    assert_eq!(parsed["displayTimeUnit"], "ns");

    let typed: ChromeTrace = serde_json::from_str(&json_str).unwrap();
    let blocked = typed.trace_events.iter().find(|e| e.name == "BlockedSync").unwrap();
    assert_eq!(blocked.ph, "X");
    assert_eq!(blocked.args.as_ref().unwrap()["waiting_for"], "config-lock");

    let names: Vec<_> = typed.trace_events.iter().filter(|e| e.ph == "M").collect();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].args.as_ref().unwrap()["name"], "main");
}

#[test]
fn test_export_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("trace.json");
    let exporter = ChromeTraceExporter::new();
    exporter.export_file(&path).unwrap();

    let parsed: ChromeTrace = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(parsed.trace_events.is_empty());
}
