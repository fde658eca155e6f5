//! XBee API protocol core
//!
//! This module provides the wire format, the escape transcoder, streaming
//! frame assembly, and the typed request/response model.

mod assembler;
mod at_data;
mod checksum;
pub mod codec;
mod error;
pub mod escape;
mod reader;
mod request;
mod response;
mod types;

pub use assembler::{FrameAssembler, FrameReader};
pub use at_data::{AtData, IoSample, NodeInfo, SleepMode};
pub use checksum::Checksum;
pub use error::{Error, Result};
pub use escape::Unescaper;
pub use request::{
    AtCommand, BROADCAST_ADDRESS64, RemoteAtCommand, Request, TransmitRequest, UNKNOWN_ADDRESS16,
};
pub use response::{
    AtCommandResponse, IoDataSample, NodeIdentification, ReceivePacket, RemoteCommandResponse,
    Response, SensorRead, TransmitStatus,
};
pub use types::{
    ApiId, ApiMode, AtCommandStatus, DeliveryStatus, DeviceType, ModemStatus, ReceiveOptions,
};

/// Frame start delimiter
pub const START_DELIMITER: u8 = 0x7E;

/// Escape marker in escaped API mode
pub const ESCAPE: u8 = 0x7D;

/// Software flow control: resume
pub const XON: u8 = 0x11;

/// Software flow control: pause
pub const XOFF: u8 = 0x13;

/// Size of the length field in bytes
pub const LENGTH_SIZE: usize = 2;

/// Delimiter, length and checksum
pub const FRAME_OVERHEAD: usize = 1 + LENGTH_SIZE + 1;

/// Largest payload the length field can describe
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Frame id telling the module not to send a response
pub const NO_RESPONSE_FRAME_ID: u8 = 0;
