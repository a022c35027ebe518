//! Trace export functionality
//!
//! Currently supports the Chrome Trace Event Format, for viewing timelines in
//! Perfetto or `chrome://tracing`.

pub mod chrome_trace;

pub use chrome_trace::{ChromeTrace, ChromeTraceEvent, ChromeTraceExporter};
