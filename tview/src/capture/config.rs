//! Capture configuration

use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::domain::ConfigError;

/// Default queue capacity, in events
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// How long the flusher may sit on buffered bytes before pushing them to the sink
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

/// Bounded wait used by `overflow=block` when no `block_ms` is given
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// What `record` does when the event queue is full.
///
/// Either way, every event is persisted or counted in the dropped-event
/// counter, which ends up in the trace header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room (never blocks)
    DropOldest,
    /// Wait up to `timeout` for room, then drop the new event
    Block { timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Trace file written by [`CaptureSession::start_file`](super::CaptureSession::start_file)
    pub output: PathBuf,
    pub buffer_capacity: usize,
    pub overflow: OverflowPolicy,
    pub flush_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("trace.tview"),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            overflow: OverflowPolicy::DropOldest,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl CaptureConfig {
    /// Parse agent-style arguments: `output=trace.tview,buffer=4096,overflow=block,block_ms=5,flush_ms=20`
    ///
    /// Unknown keys are logged and ignored; malformed values are rejected.
    pub fn from_agent_args(args: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut block = false;
        let mut block_timeout = DEFAULT_BLOCK_TIMEOUT;

        for arg in args.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            let Some((key, value)) = arg.split_once('=') else {
                warn!("Ignoring capture argument without a value: {arg}");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let invalid = || ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() };

            match key {
                "output" if !value.is_empty() => config.output = PathBuf::from(value),
                "output" => return Err(invalid()),
                "buffer" => {
                    config.buffer_capacity = value.parse().ok().filter(|&n: &usize| n > 0).ok_or_else(invalid)?;
                }
                "overflow" => {
                    block = match value {
                        "drop-oldest" | "drop_oldest" | "drop" => false,
                        "block" => true,
                        _ => return Err(invalid()),
                    };
                }
                "block_ms" => block_timeout = Duration::from_millis(value.parse().map_err(|_| invalid())?),
                "flush_ms" => {
                    let ms: u64 = value.parse().ok().filter(|&ms| ms > 0).ok_or_else(invalid)?;
                    config.flush_interval = Duration::from_millis(ms);
                }
                _ => warn!("Unknown capture argument: {key}"),
            }
        }

        if block {
            config.overflow = OverflowPolicy::Block { timeout: block_timeout };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_args_give_defaults() {
        assert_eq!(CaptureConfig::from_agent_args("").unwrap(), CaptureConfig::default());
        assert_eq!(CaptureConfig::from_agent_args(" , ").unwrap(), CaptureConfig::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let config =
            CaptureConfig::from_agent_args("output=/tmp/app.tview, buffer=128,block_ms=3,overflow=block,flush_ms=20")
                .unwrap();
        assert_eq!(config.output, PathBuf::from("/tmp/app.tview"));
        assert_eq!(config.buffer_capacity, 128);
        assert_eq!(config.overflow, OverflowPolicy::Block { timeout: Duration::from_millis(3) });
        assert_eq!(config.flush_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = CaptureConfig::from_agent_args("debug=true,buffer=8").unwrap();
        assert_eq!(config.buffer_capacity, 8);
        assert_eq!(config.overflow, OverflowPolicy::DropOldest);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(CaptureConfig::from_agent_args("buffer=0").is_err());
        assert!(CaptureConfig::from_agent_args("buffer=lots").is_err());
        assert!(CaptureConfig::from_agent_args("overflow=sometimes").is_err());
        assert!(CaptureConfig::from_agent_args("output=").is_err());
        let err = CaptureConfig::from_agent_args("flush_ms=0").unwrap_err();
        assert!(err.to_string().contains("flush_ms"));
    }
}
