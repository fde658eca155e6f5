//! XBee error types

use std::time::Duration;

use thiserror::Error;

use super::ApiMode;

/// XBee protocol and session errors
#[derive(Error, Debug)]
pub enum Error {
    /// Reserved byte appeared unescaped in an escaped-mode stream
    #[error("unescaped reserved byte {byte:#04x} in escaped stream")]
    Framing {
        /// Offending byte
        byte: u8,
    },

    /// Checksum mismatch
    #[error("checksum mismatch: expected {expected:#04x}, got {found:#04x}")]
    ChecksumMismatch {
        /// Expected checksum
        expected: u8,
        /// Found checksum
        found: u8,
    },

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Payload too large for the 16-bit length field
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// AT command mnemonic is not two ASCII characters
    #[error("invalid AT command {0:?}: expected two ASCII characters")]
    InvalidCommand(String),

    /// Operation is not available in the current API mode
    #[error("{operation} is not supported in API mode {mode}")]
    UnsupportedMode {
        /// Current mode
        mode: ApiMode,
        /// Rejected operation
        operation: &'static str,
    },

    /// The API mode could not be detected while opening
    #[error("the API mode could not be read or is configured wrong")]
    ApiModeUndetermined,

    /// No matching response arrived in time
    #[error("no response for frame {frame_id} within {waited:?}")]
    Timeout {
        /// Correlation id of the request (0 for transparent mode)
        frame_id: u8,
        /// Time waited
        waited: Duration,
    },

    /// Another correlated exchange is still waiting for its response
    #[error("exchange for frame {frame_id} is still pending")]
    ExchangeInProgress {
        /// Frame id of the outstanding exchange
        frame_id: u8,
    },

    /// Request cannot be matched to a response
    #[error("request cannot be correlated with a response")]
    Uncorrelated,

    /// Session is not in a state that allows the operation
    #[error("device is {state}")]
    InvalidState {
        /// Current session state
        state: &'static str,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
