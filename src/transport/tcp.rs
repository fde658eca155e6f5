//! Serial-over-TCP bridge transport (ser2net and similar).

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::Transport;

/// Default read timeout, short enough for the receive thread to notice shutdown
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// TCP stream carrying the raw module byte stream.
///
/// `close` shuts the stream down; a later `open` connects to the same peer
/// again. A peer closing the connection surfaces as
/// [`io::ErrorKind::UnexpectedEof`] on `read`.
#[derive(Debug)]
pub struct TcpTransport {
    stream: RwLock<TcpStream>,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl TcpTransport {
    /// Connect to a bridge at `addr`.
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Self::from_stream(TcpStream::connect(addr)?)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        configure(&stream, Some(DEFAULT_READ_TIMEOUT), None)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream: RwLock::new(stream),
            peer,
            closed: AtomicBool::new(false),
        })
    }

    /// Set the read timeout.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.read().set_read_timeout(timeout)
    }

    /// Set the write timeout.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.read().set_write_timeout(timeout)
    }

    /// Remote address of the bridge.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

fn configure(
    stream: &TcpStream,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(read_timeout)?;
    stream.set_write_timeout(write_timeout)
}

impl Transport for TcpTransport {
    fn open(&self) -> io::Result<()> {
        if !self.closed.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut stream = self.stream.write();
        let fresh = TcpStream::connect(self.peer)?;
        configure(&fresh, stream.read_timeout()?, stream.write_timeout()?)?;
        *stream = fresh;
        self.closed.store(false, Ordering::Release);
        info!(peer = %self.peer, "tcp transport reconnected");
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match (&*self.stream.read()).read(buf)? {
            0 if !buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            read => Ok(read),
        }
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream.read();
        (&*stream).write_all(data)?;
        (&*stream).flush()
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        match self.stream.read().shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => {
                debug!(peer = %self.peer, "tcp transport closed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_roundtrip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpTransport::connect(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        transport.write_all(&[0x7E, 0x00, 0x02]).unwrap();
        let mut received = [0u8; 3];
        server.read_exact(&mut received).unwrap();
        assert_eq!(received, [0x7E, 0x00, 0x02]);

        server.write_all(&[0x8A, 0x02]).unwrap();
        let mut buf = [0u8; 8];
        let mut got = Vec::new();
        while got.len() < 2 {
            match transport.read(&mut buf) {
                Ok(n) => got.extend_from_slice(&buf[..n]),
                Err(err) if crate::transport::is_idle(&err) => {}
                Err(err) => panic!("read failed: {err}"),
            }
        }
        assert_eq!(got, [0x8A, 0x02]);
        assert_eq!(transport.peer_addr(), addr);
    }

    #[test]
    fn test_idle_read_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let transport = TcpTransport::connect(listener.local_addr().unwrap()).unwrap();
        let _server = listener.accept().unwrap();

        let mut buf = [0u8; 8];
        let err = transport.read(&mut buf).unwrap_err();
        assert!(crate::transport::is_idle(&err));
        transport.close().unwrap();
    }

    #[test]
    fn test_peer_close_reports_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let transport = TcpTransport::connect(listener.local_addr().unwrap()).unwrap();
        drop(listener.accept().unwrap());

        let mut buf = [0u8; 8];
        let err = loop {
            match transport.read(&mut buf) {
                Err(err) if crate::transport::is_idle(&err) => {}
                Err(err) => break err,
                Ok(n) => panic!("unexpected {n} bytes"),
            }
        };
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_open_after_close_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let transport = TcpTransport::connect(listener.local_addr().unwrap()).unwrap();
        let _first = listener.accept().unwrap();

        transport.close().unwrap();
        assert!(transport.write_all(&[0x01]).is_err());

        transport.open().unwrap();
        let (mut second, _) = listener.accept().unwrap();
        transport.write_all(&[0x7E]).unwrap();
        let mut byte = [0u8; 1];
        second.read_exact(&mut byte).unwrap();
        assert_eq!(byte, [0x7E]);
    }
}
