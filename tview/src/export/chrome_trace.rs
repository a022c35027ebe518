use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::ExportError;
use crate::format::Trace;
use crate::query::{Inspector, SegmentDetails};
use crate::timeline::{SequenceViolation, StateSegment, Timeline};

/// All threads of a trace share one process lane
const TRACE_PID: u32 = 1;

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromeTraceEvent {
    /// Thread state, or `thread_name` for metadata
    pub name: String,
    /// Category for filtering/coloring
    pub cat: String,
    /// Phase: "X" = complete, "i" = instant, "M" = metadata
    pub ph: String,
    /// Timestamp in microseconds
    pub ts: f64,
    /// Duration in microseconds ("X" events only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dur: Option<f64>,
    pub pid: u32,
    pub tid: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize, Deserialize)]
pub struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    pub display_time_unit: String,
}

/// Collects timeline segments as Chrome trace events
#[derive(Debug, Default)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
    /// tid -> thread name, for `thread_name` metadata
    threads: BTreeMap<u32, String>,
}

impl ChromeTraceExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every segment and violation of a reconstructed trace
    pub fn add_timeline(&mut self, trace: &Trace, timeline: &Timeline) {
        let inspector = Inspector::new(trace);
        for lane in &timeline.lanes {
            self.threads.insert(lane.thread.0, inspector.thread_name(lane.thread));
            for segment in &lane.segments {
                match inspector.describe(segment) {
                    Ok(details) => self.add_segment(&details),
                    Err(err) => {
                        warn!("Exporting {} segment on {} without details: {err}", segment.state, segment.thread);
                        self.add_bare_segment(segment);
                    }
                }
            }
        }
        for violation in &timeline.violations {
            self.add_violation(violation);
        }
        debug!("Collected {} chrome trace events", self.events.len());
    }

    /// Add one described segment as a complete ("X") event
    pub fn add_segment(&mut self, details: &SegmentDetails) {
        let mut args = HashMap::new();
        args.insert("state".to_string(), serde_json::json!(details.state.label()));
        if let Some(code) = details.state.code() {
            args.insert("state_code".to_string(), serde_json::json!(code));
        }
        if let Some(waiting_for) = &details.waiting_for {
            args.insert("waiting_for".to_string(), serde_json::json!(waiting_for));
        }
        if let Some(timeout) = details.timeout {
            args.insert("timeout_ns".to_string(), serde_json::json!(timeout.0));
        }
        if let Some(annotation) = &details.annotation {
            args.insert("annotation".to_string(), serde_json::json!(annotation));
        }

        self.threads.entry(details.thread.0).or_insert_with(|| details.thread_name.clone());
        self.events.push(ChromeTraceEvent {
            name: details.state.label().to_string(),
            cat: "state".to_string(),
            ph: "X".to_string(),
            ts: details.start.as_micros_f64(),
            dur: Some(details.end.as_micros_f64() - details.start.as_micros_f64()),
            pid: TRACE_PID,
            tid: details.thread.0,
            args: Some(args),
        });
    }

    fn add_bare_segment(&mut self, segment: &StateSegment) {
        self.events.push(ChromeTraceEvent {
            name: segment.state.label().to_string(),
            cat: "state".to_string(),
            ph: "X".to_string(),
            ts: segment.start.as_micros_f64(),
            dur: Some(segment.end.as_micros_f64() - segment.start.as_micros_f64()),
            pid: TRACE_PID,
            tid: segment.thread.0,
            args: None,
        });
    }

    fn add_violation(&mut self, violation: &SequenceViolation) {
        let mut args = HashMap::new();
        args.insert("violation".to_string(), serde_json::json!(violation.kind.to_string()));
        self.events.push(ChromeTraceEvent {
            name: "sequence_violation".to_string(),
            cat: "diagnostic".to_string(),
            ph: "i".to_string(),
            ts: violation.timestamp.as_micros_f64(),
            dur: None,
            pid: TRACE_PID,
            tid: violation.thread.0,
            args: Some(args),
        });
    }

    /// Write the collected events as JSON to any writer
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut all_events = self.events.clone();

        for (&tid, name) in &self.threads {
            let mut args = HashMap::new();
            args.insert("name".to_string(), serde_json::json!(name));
            all_events.push(ChromeTraceEvent {
                name: "thread_name".to_string(),
                cat: String::new(),
                ph: "M".to_string(),
                ts: 0.0,
                dur: None,
                pid: TRACE_PID,
                tid,
                args: Some(args),
            });
        }

        let trace = ChromeTrace { trace_events: all_events, display_time_unit: "ns".to_string() };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    pub fn export_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.export(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
