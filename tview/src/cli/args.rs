//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tview",
    version,
    about = "Capture and inspect thread concurrency traces",
    after_help = "\
EXAMPLES:
    tview demo trace.tview                     Record a small lock-contention workload
    tview inspect trace.tview                  Print per-thread segments and contention
    tview inspect trace.tview --thread 2       Only thread 2
    tview inspect trace.tview --export t.json  Also write a Chrome trace for Perfetto"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a trace and print its reconstructed timeline
    Inspect {
        /// Trace file written by a capture session
        #[arg(value_name = "TRACE")]
        trace: PathBuf,

        /// Only show this thread id
        #[arg(short, long)]
        thread: Option<u32>,

        /// Fail on the first malformed event sequence instead of repairing it
        #[arg(long)]
        strict: bool,

        /// Export the timeline as Chrome Trace Event JSON
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },

    /// Run a multi-threaded demo workload under capture
    Demo {
        /// Output trace file
        #[arg(value_name = "OUT")]
        output: PathBuf,

        /// Worker threads contending on the shared lock
        #[arg(long, default_value = "4")]
        threads: u32,

        /// Lock acquisitions per worker
        #[arg(long, default_value = "25")]
        iterations: u32,

        /// Extra capture options, e.g. "buffer=1024,overflow=block"
        #[arg(long, value_name = "ARGS", default_value = "")]
        capture: String,
    },
}
