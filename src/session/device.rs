//! Device session: API mode negotiation, request execution and the
//! background receive thread.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

#[cfg(feature = "debug-tools")]
use crate::transport::TraceRecorder;
use crate::protocol::{
    ApiMode, AtCommand, AtData, Error, FrameReader, NO_RESPONSE_FRAME_ID, Request, Response,
    Result,
};
use crate::transport::{Transport, is_idle};

use super::DeviceConfig;
use super::events::{Event, Listeners, LogLevel, Subscription};
use super::exchange::ExchangeCoordinator;
use super::stats::{SessionStats, StatsSnapshot};

/// Sequence that switches a transparent-mode module into command mode
const COMMAND_MODE_SEQUENCE: &[u8] = b"+++";
/// Reply of a module that entered command mode
const OK_REPLY: &str = "OK";
/// Line terminator of transparent-mode replies
const CARRIAGE_RETURN: u8 = b'\r';

/// Lifecycle state of a [`Device`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Not open
    Closed,
    /// Open in progress, API mode being negotiated
    Detecting,
    /// Open and accepting requests
    Ready,
}

impl DeviceState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Detecting => "detecting",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`Device::execute`]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Reply line of a transparent-mode command (without the trailing CR)
    Text(String),
    /// Correlated response frame
    Frame(Arc<Response>),
}

impl Reply {
    /// The response frame, in API modes
    #[must_use]
    pub fn as_frame(&self) -> Option<&Arc<Response>> {
        match self {
            Self::Frame(response) => Some(response),
            Self::Text(_) => None,
        }
    }

    /// The reply line, in transparent mode
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(line) => Some(line),
            Self::Frame(_) => None,
        }
    }

    /// Take the response frame
    #[must_use]
    pub fn into_frame(self) -> Option<Arc<Response>> {
        match self {
            Self::Frame(response) => Some(response),
            Self::Text(_) => None,
        }
    }
}

/// State shared with the receive thread
struct Shared {
    transport: Arc<dyn Transport>,
    mode: AtomicU8,
    exchange: ExchangeCoordinator,
    listeners: Arc<Listeners>,
    stats: SessionStats,
    #[cfg(feature = "debug-tools")]
    trace: Option<TraceRecorder>,
}

impl Shared {
    fn api_mode(&self) -> ApiMode {
        ApiMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    fn set_api_mode(&self, mode: ApiMode) {
        self.mode.store(mode.as_u8(), Ordering::Release);
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        #[cfg(feature = "debug-tools")]
        if let Some(trace) = &self.trace {
            if let Err(err) = trace.outbound(bytes) {
                debug!(error = ?err, "failed to record outbound bytes");
            }
        }
        if let Err(err) = self.transport.write_all(bytes) {
            self.listeners
                .log(LogLevel::Error, format!("transport write failed: {err}"));
            return Err(err.into());
        }
        self.stats.record_sent(bytes.len());
        Ok(())
    }

    /// One transport read; `Ok(0)` means nothing arrived
    fn poll_read(&self, buf: &mut [u8], idle: Duration) -> io::Result<usize> {
        match self.transport.read(buf) {
            Ok(0) => {
                thread::sleep(idle);
                Ok(0)
            }
            Ok(read) => {
                #[cfg(feature = "debug-tools")]
                if let Some(trace) = &self.trace {
                    if let Err(err) = trace.inbound(&buf[..read]) {
                        debug!(error = ?err, "failed to record inbound bytes");
                    }
                }
                Ok(read)
            }
            // the read already blocked for its timeout
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) if is_idle(&err) => {
                thread::sleep(idle);
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    fn dispatch(&self, payload: Bytes) {
        let api_id = payload.first().copied();
        match Response::decode(payload) {
            Ok(Some(response)) => {
                self.stats.record_frame_received();
                let response = Arc::new(response);
                if let Response::ModemStatus(status) = response.as_ref() {
                    self.listeners.emit(&Event::ModemStatusChanged(*status));
                }
                if !self.exchange.complete(&response) {
                    if let Some(frame_id) = response.correlation_id() {
                        debug!(
                            frame_id,
                            pending = ?self.exchange.pending_frame_id(),
                            "AT response with no matching exchange"
                        );
                    }
                }
                self.listeners.emit(&Event::FrameReceived(response));
            }
            Ok(None) => {
                self.stats.record_unknown_frame();
                let id = api_id.map_or_else(|| "(empty)".to_owned(), |id| format!("{id:#04x}"));
                self.listeners
                    .log(LogLevel::Debug, format!("dropped frame with API id {id}"));
            }
            Err(err) => {
                self.stats.record_decode_error();
                self.listeners
                    .log(LogLevel::Warning, format!("dropped undecodable frame: {err}"));
            }
        }
    }
}

fn receive_loop(shared: &Shared, cancel: &AtomicBool, chunk_size: usize, idle: Duration) {
    let mut reader = FrameReader::new();
    let mut buf = vec![0u8; chunk_size];
    // set while reads keep failing; one log event per failure streak
    let mut failing = false;
    debug!("receive thread started");

    while !cancel.load(Ordering::Acquire) {
        let read = match shared.poll_read(&mut buf, idle) {
            Ok(0) => continue,
            Ok(read) => read,
            Err(err) => {
                if cancel.load(Ordering::Acquire) {
                    break;
                }
                if !failing {
                    failing = true;
                    shared
                        .listeners
                        .log(LogLevel::Error, format!("transport read failed: {err}"));
                }
                thread::sleep(idle);
                continue;
            }
        };

        if failing {
            failing = false;
            shared.listeners.log(LogLevel::Info, "transport read recovered");
        }

        shared.stats.record_bytes_received(read);
        if let Err(err) = reader.feed(shared.api_mode(), &buf[..read]) {
            shared.stats.record_framing_error();
            shared
                .listeners
                .log(LogLevel::Warning, format!("receive buffer cleared: {err}"));
            continue;
        }
        while let Some(payload) = reader.next_frame() {
            shared.dispatch(payload);
        }
    }

    debug!("receive thread stopped");
}

struct ReceiveTask {
    cancel: Arc<AtomicBool>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

fn encode_request(request: &Request, mode: ApiMode, frame_id: u8) -> Result<Vec<u8>> {
    match mode {
        // mode detection talks plain API frames
        ApiMode::Unknown => request.api_packet(frame_id),
        _ => request.render(mode, frame_id),
    }
}

/// Session with one XBee module.
///
/// `open` negotiates the API mode and, in API modes, starts a background
/// thread that decodes inbound frames, completes pending exchanges and
/// raises [`Event`]s. All methods take `&self`; a `Device` can be shared
/// between threads behind an `Arc`.
pub struct Device {
    shared: Arc<Shared>,
    config: DeviceConfig,
    state: Mutex<DeviceState>,
    lifecycle: Mutex<Option<ReceiveTask>>,
    text_exchange: Mutex<()>,
}

impl Device {
    /// Create a closed session over `transport`.
    pub fn new(transport: impl Transport, config: DeviceConfig) -> Self {
        #[cfg(feature = "debug-tools")]
        let trace = config.trace_path.as_deref().and_then(|path| {
            TraceRecorder::create(path)
                .inspect_err(|err| warn!(error = %err, path = %path.display(), "trace disabled"))
                .ok()
        });

        let shared = Arc::new(Shared {
            transport: Arc::new(transport),
            mode: AtomicU8::new(config.api_mode.as_u8()),
            exchange: ExchangeCoordinator::new(),
            listeners: Listeners::new(),
            stats: SessionStats::default(),
            #[cfg(feature = "debug-tools")]
            trace,
        });

        Self {
            shared,
            config,
            state: Mutex::new(DeviceState::Closed),
            lifecycle: Mutex::new(None),
            text_exchange: Mutex::new(()),
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    /// Configured or detected API mode
    #[must_use]
    pub fn api_mode(&self) -> ApiMode {
        self.shared.api_mode()
    }

    /// Traffic and error counters
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Register a notification callback.
    ///
    /// The callback runs on the receive thread.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.shared.listeners.add(callback);
        debug!(listeners = self.shared.listeners.len(), "listener registered");
        subscription
    }

    fn set_state(&self, state: DeviceState) {
        *self.state.lock() = state;
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            DeviceState::Ready => Ok(()),
            state => Err(Error::InvalidState {
                state: state.as_str(),
            }),
        }
    }

    /// Open the transport and negotiate the API mode.
    ///
    /// With [`ApiMode::Unknown`] the session first tries `+++` and accepts
    /// an `OK` reply as transparent mode; otherwise it starts the receive
    /// thread and asks the module for its `AP` setting. Returns the mode in
    /// effect.
    #[instrument(level = "info", skip_all)]
    pub fn open(&self) -> Result<ApiMode> {
        let mut task = self.lifecycle.lock();
        let state = self.state();
        if state != DeviceState::Closed {
            return Err(Error::InvalidState {
                state: state.as_str(),
            });
        }

        self.shared.transport.open()?;
        self.set_state(DeviceState::Detecting);

        match self.negotiate(&mut task) {
            Ok(mode) => {
                self.set_state(DeviceState::Ready);
                self.shared
                    .listeners
                    .log(LogLevel::Info, format!("device open in {mode} mode"));
                Ok(mode)
            }
            Err(err) => {
                if let Some(running) = task.take() {
                    self.stop_receiver(running);
                }
                if let Err(close_err) = self.shared.transport.close() {
                    debug!(error = %close_err, "transport close after failed open");
                }
                self.set_state(DeviceState::Closed);
                self.shared
                    .listeners
                    .log(LogLevel::Error, format!("open failed: {err}"));
                Err(err)
            }
        }
    }

    fn negotiate(&self, task: &mut Option<ReceiveTask>) -> Result<ApiMode> {
        match self.shared.api_mode() {
            ApiMode::TransparentAt => Ok(ApiMode::TransparentAt),
            mode if mode.is_api() => {
                *task = Some(self.spawn_receiver()?);
                Ok(mode)
            }
            _ => {
                if self.enter_command_mode()? {
                    self.shared.set_api_mode(ApiMode::TransparentAt);
                    return Ok(ApiMode::TransparentAt);
                }

                *task = Some(self.spawn_receiver()?);
                let mode = self.query_api_mode().map_err(|err| {
                    self.shared
                        .listeners
                        .log(LogLevel::Warning, format!("API mode query failed: {err}"));
                    Error::ApiModeUndetermined
                })?;
                self.shared.set_api_mode(mode);
                Ok(mode)
            }
        }
    }

    fn enter_command_mode(&self) -> Result<bool> {
        self.shared.write(COMMAND_MODE_SEQUENCE)?;
        let reply = self.read_line(self.config.guard_time + self.config.reply_timeout)?;
        match reply {
            Some(line) if line.trim() == OK_REPLY => {
                thread::sleep(self.config.guard_time_after);
                Ok(true)
            }
            Some(line) => {
                debug!(reply = %line.escape_debug(), "unexpected reply to command sequence");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn query_api_mode(&self) -> Result<ApiMode> {
        let request = Request::from(AtCommand::api_enable());
        let response = self.exchange(&request, ApiMode::Unknown, self.config.exchange_timeout)?;
        match response.as_at_command().and_then(|at| at.data()) {
            Some(AtData::ApiEnable(mode)) if mode.is_api() => Ok(*mode),
            _ => Err(Error::ApiModeUndetermined),
        }
    }

    /// Read one CR-terminated line; `None` if `timeout` elapses first
    fn read_line(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while Instant::now() < deadline {
            match self.shared.poll_read(&mut byte, self.config.idle_interval) {
                Ok(0) => {}
                Ok(_) if byte[0] == CARRIAGE_RETURN => {
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                Ok(_) => line.push(byte[0]),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    fn spawn_receiver(&self) -> Result<ReceiveTask> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&cancel);
        let chunk_size = self.config.read_chunk_size.max(1);
        let idle = self.config.idle_interval;

        let handle = thread::Builder::new()
            .name("xbee-receive".to_owned())
            .spawn(move || {
                receive_loop(&shared, &flag, chunk_size, idle);
                let _ = done_tx.send(());
            })?;

        Ok(ReceiveTask {
            cancel,
            done: done_rx,
            handle,
        })
    }

    fn stop_receiver(&self, task: ReceiveTask) {
        task.cancel.store(true, Ordering::Release);

        let stopped = |result: std::result::Result<(), RecvTimeoutError>| {
            matches!(result, Ok(()) | Err(RecvTimeoutError::Disconnected))
        };

        let mut finished = stopped(task.done.recv_timeout(self.config.join_timeout));
        if !finished {
            warn!("receive thread did not stop in time, closing transport");
            if let Err(err) = self.shared.transport.close() {
                debug!(error = %err, "transport close failed");
            }
            finished = stopped(task.done.recv_timeout(self.config.join_timeout));
        }

        if finished {
            if task.handle.join().is_err() {
                warn!("receive thread panicked");
            }
        } else {
            self.shared
                .listeners
                .log(LogLevel::Error, "receive thread detached after join timeout");
        }
    }

    fn exchange(&self, request: &Request, mode: ApiMode, timeout: Duration) -> Result<Arc<Response>> {
        let pending = self.shared.exchange.begin()?;
        let bytes = encode_request(request, mode, pending.frame_id())?;
        let started = Instant::now();
        self.shared.write(&bytes)?;

        match pending.wait(timeout) {
            Ok(response) => {
                self.shared.stats.record_exchange(started.elapsed());
                Ok(response)
            }
            Err(err) => {
                if matches!(err, Error::Timeout { .. }) {
                    self.shared.stats.record_timeout();
                    self.shared.listeners.log(LogLevel::Warning, err.to_string());
                }
                Err(err)
            }
        }
    }

    fn execute_text(&self, request: &Request, timeout: Duration) -> Result<Reply> {
        let Some(_guard) = self.text_exchange.try_lock() else {
            return Err(Error::ExchangeInProgress {
                frame_id: NO_RESPONSE_FRAME_ID,
            });
        };

        let text = request.at_packet()?;
        self.shared.write(&text)?;
        match self.read_line(timeout)? {
            Some(line) => Ok(Reply::Text(line)),
            None => {
                self.shared.stats.record_timeout();
                Err(Error::Timeout {
                    frame_id: NO_RESPONSE_FRAME_ID,
                    waited: timeout,
                })
            }
        }
    }

    /// Send a local AT command and wait up to `timeout` for its reply.
    ///
    /// In API modes the request gets a fresh frame id and the call returns
    /// the AT command response carrying the same id; other frames arriving
    /// meanwhile are only delivered as [`Event::FrameReceived`]. Only one
    /// exchange may be outstanding; a concurrent call fails with
    /// [`Error::ExchangeInProgress`]. Remote commands, transmit requests and
    /// requests built with `without_response` fail with
    /// [`Error::Uncorrelated`]; send those with [`Device::execute_non_query`].
    ///
    /// In transparent mode the command is written as text and the reply
    /// line is returned.
    #[instrument(level = "debug", skip_all)]
    pub fn execute(&self, request: impl Into<Request>, timeout: Duration) -> Result<Reply> {
        let request = request.into();
        self.ensure_ready()?;

        match self.api_mode() {
            ApiMode::TransparentAt => self.execute_text(&request, timeout),
            mode if mode.is_api() => {
                let local_at = matches!(request, Request::AtCommand(_) | Request::AtCommandQueue(_));
                if !local_at || !request.is_correlated() {
                    return Err(Error::Uncorrelated);
                }
                self.exchange(&request, mode, timeout).map(Reply::Frame)
            }
            mode => Err(Error::UnsupportedMode {
                mode,
                operation: "execute",
            }),
        }
    }

    /// Write a request without waiting for a reply.
    ///
    /// Returns the frame id assigned to the request, or 0 when it asked for
    /// no response (always 0 in transparent mode).
    #[instrument(level = "debug", skip_all)]
    pub fn execute_non_query(&self, request: impl Into<Request>) -> Result<u8> {
        let request = request.into();
        self.ensure_ready()?;

        let mode = self.api_mode();
        let frame_id = if mode.is_api() && request.is_correlated() {
            self.shared.exchange.next_frame_id()
        } else {
            NO_RESPONSE_FRAME_ID
        };
        let bytes = encode_request(&request, mode, frame_id)?;
        self.shared.write(&bytes)?;
        debug!(api_id = ?request.api_id(), frame_id, "request sent");
        Ok(frame_id)
    }

    /// Stop the receive thread and close the transport.
    ///
    /// A pending [`Device::execute`] fails immediately. If the receive
    /// thread does not stop within the join timeout the transport is closed
    /// underneath it; if it still does not stop it is left detached.
    #[instrument(level = "info", skip_all)]
    pub fn close(&self) -> Result<()> {
        let mut task = self.lifecycle.lock();
        if self.state() == DeviceState::Closed {
            return Ok(());
        }

        self.shared.exchange.cancel();
        if let Some(running) = task.take() {
            self.stop_receiver(running);
        }
        self.set_state(DeviceState::Closed);

        let result = self.shared.transport.close();
        self.shared.listeners.log(LogLevel::Info, "device closed");
        result.map_err(Error::from)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("state", &self.state())
            .field("api_mode", &self.api_mode())
            .finish_non_exhaustive()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.state() != DeviceState::Closed {
            if let Err(err) = self.close() {
                debug!(error = %err, "close on drop failed");
            }
        }
    }
}
