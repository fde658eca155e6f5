//! XBee API - protocol engine for Digi XBee/ZigBee radio modules
//!
//! This library talks to an XBee module over a byte stream (serial port or a
//! serial-over-TCP bridge). It includes the API frame codec with escaping,
//! streaming frame assembly, a typed request/response model, and a device
//! session that correlates requests with responses on top of a background
//! receive thread.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use xbee::{AtCommand, Device, DeviceConfig, TcpTransport};
//!
//! let transport = TcpTransport::connect("192.168.1.20:2001")?;
//! let device = Device::new(transport, DeviceConfig::default());
//! let mode = device.open()?;
//! println!("module runs in {mode} mode");
//!
//! let reply = device.execute(AtCommand::new("DB")?, Duration::from_secs(1))?;
//! if let Some(response) = reply.as_frame() {
//!     println!("{response}");
//! }
//! device.close()?;
//! # Ok::<(), xbee::Error>(())
//! ```
//!
//! # Features
//!
//! - **Escaped API mode** - streaming unescape that survives arbitrary chunking
//! - **Mode detection** - transparent `+++` probe, then an `AP` query
//! - **Correlated exchanges** - frame ids with a blocking call-with-timeout API
//! - **Notifications** - received frames, modem status changes and log events
//! - `serial` - local serial ports via `serialport`
//! - `debug-tools` - hex trace of the raw byte stream
//! - `serde` - (de)serializable configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod listener;
pub mod protocol;
pub mod session;
pub mod transport;

pub use listener::{ConnectionHandler, Listener, ListenerConfig, ListenerHandle};
pub use protocol::{
    ApiMode, AtCommand, AtData, Error, MAX_PAYLOAD_SIZE, RemoteAtCommand, Request, Response,
    Result, TransmitRequest,
};
pub use session::{Device, DeviceConfig, DeviceState, Event, LogLevel, Reply, Subscription};
pub use transport::{TcpTransport, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
