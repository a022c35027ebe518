//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a sync-object id
//! where a thread id is expected, and make function signatures more expressive.

use std::fmt;

/// Thread ID
///
/// The id the instrumentation layer uses for a thread. Unique within one
/// trace; registered the first time any event for it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Sync object identity
///
/// Address or identity hash of a lock/monitor. Unique per trace only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncId(pub u64);

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Byte offset of an entry in the string table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringOffset(pub u32);

impl fmt::Display for StringOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Timestamp in nanoseconds
///
/// Monotonic, relative to the start of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds (f64), the unit Chrome trace uses
    #[allow(clippy::cast_precision_loss)]
    pub fn as_micros_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is later
    #[must_use]
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Duration in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// Convert to milliseconds (f64)
    #[allow(clippy::cast_precision_loss)]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds (u64)
    pub fn as_micros(self) -> u64 {
        self.0 / 1_000
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Duration(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 1_000 {
            write!(f, "{}ns", self.0)
        } else if self.0 < 1_000_000 {
            write!(f, "{:.2}µs", self.0 as f64 / 1_000.0)
        } else if self.0 < 1_000_000_000 {
            write!(f, "{:.2}ms", self.as_millis())
        } else {
            write!(f, "{:.2}s", self.as_seconds())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(ThreadId(7).to_string(), "T7");
        assert_eq!(SyncId(0xdead).to_string(), "0xdead");
        assert_eq!(StringOffset(12).to_string(), "@12");
    }

    #[test]
    fn test_timestamp_since() {
        assert_eq!(Timestamp(25).since(Timestamp(10)), Duration(15));
        assert_eq!(Timestamp(10).since(Timestamp(25)), Duration(0));
    }

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp(1_500_000_000);
        assert_eq!(ts.as_seconds(), 1.5);
        assert_eq!(ts.as_micros_f64(), 1_500_000.0);
    }

    #[test]
    fn test_duration_conversions() {
        let dur = Duration(5_000_000);
        assert_eq!(dur.as_millis(), 5.0);
        assert_eq!(dur.as_seconds(), 0.005);
        assert_eq!(dur.as_micros(), 5_000);
        assert_eq!(Duration::from(std::time::Duration::from_micros(3)), Duration(3_000));
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(Duration(15).to_string(), "15ns");
        assert_eq!(Duration(2_500).to_string(), "2.50µs");
        assert_eq!(Duration(5_000_000).to_string(), "5.00ms");
        assert_eq!(Duration(1_500_000_000).to_string(), "1.50s");
    }
}
