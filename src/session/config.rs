//! Device session configuration

#[cfg(feature = "debug-tools")]
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::ApiMode;

/// Session timing and buffering options.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// API mode the module is configured for; `Unknown` triggers detection on open.
    pub api_mode: ApiMode,
    /// Timeout for the `AP` query sent while detecting the API mode.
    pub exchange_timeout: Duration,
    /// Silence the module needs before it answers `+++`.
    pub guard_time: Duration,
    /// Silence the module needs after `+++` before the first command.
    pub guard_time_after: Duration,
    /// Extra time allowed for the `OK` reply to `+++`.
    pub reply_timeout: Duration,
    /// Grace period for the receive thread to stop on close.
    pub join_timeout: Duration,
    /// Sleep between polls when the transport has no data.
    pub idle_interval: Duration,
    /// Size of a single transport read.
    pub read_chunk_size: usize,
    /// Append a hex trace of the byte stream to this file.
    #[cfg(feature = "debug-tools")]
    pub trace_path: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            api_mode: ApiMode::Unknown,
            exchange_timeout: Duration::from_millis(1000),
            guard_time: Duration::from_millis(1025),
            guard_time_after: Duration::from_millis(1000),
            reply_timeout: Duration::from_millis(2000),
            join_timeout: Duration::from_millis(2000),
            idle_interval: Duration::from_millis(20),
            read_chunk_size: 1024,
            #[cfg(feature = "debug-tools")]
            trace_path: None,
        }
    }
}

impl DeviceConfig {
    /// Defaults for a module known to run in `mode`
    #[must_use]
    pub fn with_api_mode(mode: ApiMode) -> Self {
        Self {
            api_mode: mode,
            ..Self::default()
        }
    }
}
