//! Local serial port transport

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serialport::SerialPort;
use tracing::{debug, info};

use super::Transport;

/// Serial port settings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM3`
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read and write timeout
    pub timeout: Duration,
}

impl SerialConfig {
    /// Settings for `port_name` at 9600 baud
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 9600,
            timeout: Duration::from_millis(2000),
        }
    }

    /// Set the baud rate
    #[must_use]
    pub const fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Module attached to a local serial port.
///
/// Reads and writes go through separate handles to the same port so a
/// blocked read in the receive thread does not hold up writes. The port is
/// released when the transport is dropped; `close` only rejects further
/// I/O until the next `open`.
pub struct SerialTransport {
    reader: Mutex<Box<dyn SerialPort>>,
    writer: Mutex<Box<dyn SerialPort>>,
    closed: AtomicBool,
    port_name: String,
}

impl SerialTransport {
    /// Open the port described by `config`.
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        let writer = serialport::new(&config.port_name, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(config.timeout)
            .open()?;
        let reader = writer.try_clone()?;
        info!(
            port = %config.port_name,
            baud_rate = config.baud_rate,
            "serial port opened"
        );
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            port_name: config.port_name.clone(),
        })
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "serial port closed",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Transport for SerialTransport {
    // close only fences off the handles, so reopening lifts the fence
    fn open(&self) -> io::Result<()> {
        if self.closed.swap(false, Ordering::AcqRel) {
            debug!(port = %self.port_name, "serial port reopened");
        }
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.reader.lock().read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        writer.write_all(data)?;
        writer.flush()
    }

    fn close(&self) -> io::Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(port = %self.port_name, "serial port closed");
        }
        Ok(())
    }
}
