#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use xbee::protocol::codec;
use xbee::{ApiMode, DeviceConfig, Transport};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// In-memory transport: inbound chunks are scripted, writes are recorded.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

struct Inner {
    inbound_tx: Sender<Vec<u8>>,
    inbound_rx: Receiver<Vec<u8>>,
    leftover: Mutex<VecDeque<u8>>,
    writes: Mutex<Vec<Vec<u8>>>,
    responder: Mutex<Option<Responder>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                inbound_tx,
                inbound_rx,
                leftover: Mutex::new(VecDeque::new()),
                writes: Mutex::new(Vec::new()),
                responder: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue bytes for the next read
    pub fn inject(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.inner.inbound_tx.send(bytes.into());
    }

    /// Answer every write with the returned chunks
    pub fn on_write<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        *self.inner.responder.lock() = Some(Box::new(responder));
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.writes.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Transport for MockTransport {
    fn open(&self) -> io::Result<()> {
        self.inner.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut leftover = self.inner.leftover.lock();
        if leftover.is_empty() {
            match self.inner.inbound_rx.recv_timeout(Duration::from_millis(5)) {
                Ok(chunk) => leftover.extend(chunk),
                Err(_) => return Err(io::Error::from(io::ErrorKind::TimedOut)),
            }
        }
        let count = buf.len().min(leftover.len());
        for (slot, byte) in buf.iter_mut().zip(leftover.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.inner.writes.lock().push(data.to_vec());
        if let Some(responder) = self.inner.responder.lock().as_mut() {
            for chunk in responder(data) {
                self.inject(chunk);
            }
        }
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Short timings so tests do not wait on real guard times
pub fn config(mode: ApiMode) -> DeviceConfig {
    DeviceConfig {
        api_mode: mode,
        exchange_timeout: Duration::from_millis(300),
        guard_time: Duration::from_millis(10),
        guard_time_after: Duration::ZERO,
        reply_timeout: Duration::from_millis(50),
        join_timeout: Duration::from_millis(500),
        idle_interval: Duration::from_millis(2),
        ..DeviceConfig::default()
    }
}

/// Encoded AT command response frame
pub fn at_response(frame_id: u8, command: &[u8; 2], value: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x88, frame_id, command[0], command[1], 0x00];
    payload.extend_from_slice(value);
    codec::encode(&payload).unwrap()
}

/// Frame id and mnemonic of an unescaped local AT command frame
pub fn at_request(bytes: &[u8]) -> Option<(u8, [u8; 2])> {
    match bytes {
        [0x7E, _, _, 0x08, frame_id, a, b, ..] => Some((*frame_id, [*a, *b])),
        _ => None,
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
