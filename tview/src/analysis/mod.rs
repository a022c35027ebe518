//! Analysis logic for reconstructed timelines
//!
//! Pure aggregation over [`Timeline`](crate::timeline::Timeline)s, separated
//! from the CLI presentation.

pub mod contention;

pub use contention::{analyze_contention, ContentionHotspot, ContentionStats};
