//! Byte-stream transports to an XBee module
//!
//! A [`Transport`] is shared between the caller issuing requests and the
//! session's receive thread, so every method takes `&self`.

#[cfg(feature = "debug-tools")]
mod debug;
#[cfg(feature = "serial")]
mod serial;
mod tcp;

use std::io;
use std::sync::Arc;

#[cfg(feature = "debug-tools")]
pub use debug::TraceRecorder;
#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialTransport};
pub use tcp::TcpTransport;

/// Bidirectional byte stream to the module.
///
/// `read` should block for at most a short timeout and report it as
/// [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`]; the
/// receive thread treats both as "no data yet" and checks for shutdown
/// between reads.
pub trait Transport: Send + Sync + 'static {
    /// Prepare the stream; called once when the session opens
    fn open(&self) -> io::Result<()> {
        Ok(())
    }

    /// Read available bytes into `buf`
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`
    fn write_all(&self, data: &[u8]) -> io::Result<()>;

    /// Release the stream, unblocking any pending read
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn open(&self) -> io::Result<()> {
        (**self).open()
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn close(&self) -> io::Result<()> {
        (**self).close()
    }
}

/// Read errors that only mean "nothing arrived yet"
pub(crate) fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
