//! Thread-per-connection TCP listener
//!
//! An accept thread hands every approved connection to a
//! [`ConnectionHandler`] on its own worker thread; a reaper thread drops
//! finished workers periodically. The listener carries no protocol state.

use std::io;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::protocol::Result;

/// Listener options.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListenerConfig {
    /// Address to bind.
    pub bind_addr: SocketAddr,
    /// Maximum number of live worker threads; accepting pauses at the limit.
    pub max_workers: usize,
    /// How often finished workers are dropped.
    pub reap_interval: Duration,
    /// How often the accept thread checks for new connections and shutdown.
    pub poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 80)),
            max_workers: 256,
            reap_interval: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Serves one accepted connection on a worker thread.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handle the connection; the stream is closed when it is dropped.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);
}

impl<F> ConnectionHandler for F
where
    F: Fn(TcpStream, SocketAddr) + Send + Sync + 'static,
{
    fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        self(stream, peer);
    }
}

type Approval = Arc<dyn Fn(SocketAddr) -> bool + Send + Sync>;
type Workers = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Unstarted listener.
pub struct Listener {
    config: ListenerConfig,
    handler: Arc<dyn ConnectionHandler>,
    approval: Option<Approval>,
}

impl Listener {
    /// Create a listener dispatching to `handler`.
    pub fn new(config: ListenerConfig, handler: impl ConnectionHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            approval: None,
        }
    }

    /// Consult `approve` for every connection; rejected ones are shut down.
    #[must_use]
    pub fn with_approval<F>(mut self, approve: F) -> Self
    where
        F: Fn(SocketAddr) -> bool + Send + Sync + 'static,
    {
        self.approval = Some(Arc::new(approve));
        self
    }

    /// Bind and start the accept and reaper threads.
    #[instrument(level = "info", skip(self), fields(addr = %self.config.bind_addr))]
    pub fn start(self) -> Result<ListenerHandle> {
        let socket = TcpListener::bind(self.config.bind_addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let workers: Workers = Arc::new(Mutex::new(Vec::new()));

        let reaper = {
            let workers = Arc::clone(&workers);
            let shutdown = shutdown_rx.clone();
            let interval = self.config.reap_interval;
            thread::Builder::new()
                .name("listener-reaper".to_owned())
                .spawn(move || reap_workers(&workers, &shutdown, interval))?
        };

        let acceptor = {
            let workers = Arc::clone(&workers);
            let accept = AcceptLoop {
                socket,
                handler: self.handler,
                approval: self.approval,
                workers,
                shutdown: shutdown_rx,
                max_workers: self.config.max_workers.max(1),
                poll_interval: self.config.poll_interval,
            };
            thread::Builder::new()
                .name("listener-accept".to_owned())
                .spawn(move || accept.run())?
        };

        info!(%local_addr, "listener started");
        Ok(ListenerHandle {
            local_addr,
            workers,
            shutdown: Some(shutdown_tx),
            acceptor: Some(acceptor),
            reaper: Some(reaper),
        })
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("config", &self.config)
            .field("approval", &self.approval.is_some())
            .finish_non_exhaustive()
    }
}

/// Sleep for `interval`; `false` once shutdown was signalled
fn wait_or_shutdown(shutdown: &Receiver<()>, interval: Duration) -> bool {
    matches!(shutdown.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}

fn reap_workers(workers: &Mutex<Vec<JoinHandle<()>>>, shutdown: &Receiver<()>, interval: Duration) {
    while wait_or_shutdown(shutdown, interval) {
        let mut workers = workers.lock();
        let before = workers.len();
        workers.retain(|worker| !worker.is_finished());
        let reaped = before - workers.len();
        if reaped > 0 {
            debug!(reaped, active = workers.len(), "reaped worker threads");
        }
    }
}

struct AcceptLoop {
    socket: TcpListener,
    handler: Arc<dyn ConnectionHandler>,
    approval: Option<Approval>,
    workers: Workers,
    shutdown: Receiver<()>,
    max_workers: usize,
    poll_interval: Duration,
}

impl AcceptLoop {
    fn run(self) {
        loop {
            match self.socket.accept() {
                Ok((stream, peer)) => {
                    if !self.dispatch(stream, peer) {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if !wait_or_shutdown(&self.shutdown, self.poll_interval) {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!(error = %err, "accept failed, listener stopping");
                    break;
                }
            }
        }
        debug!("accept thread stopped");
    }

    /// Returns `false` when shutdown was signalled while waiting for a slot
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) -> bool {
        if let Some(approve) = &self.approval {
            if !approve(peer) {
                debug!(%peer, "connection rejected");
                if let Err(err) = stream.shutdown(Shutdown::Both) {
                    debug!(%peer, error = %err, "shutdown of rejected connection failed");
                }
                return true;
            }
        }

        while self.workers.lock().len() >= self.max_workers {
            if !wait_or_shutdown(&self.shutdown, self.poll_interval) {
                return false;
            }
        }

        if let Err(err) = stream.set_nonblocking(false) {
            warn!(%peer, error = %err, "dropping connection");
            return true;
        }

        let handler = Arc::clone(&self.handler);
        match thread::Builder::new()
            .name("listener-worker".to_owned())
            .spawn(move || handler.handle(stream, peer))
        {
            Ok(worker) => self.workers.lock().push(worker),
            Err(err) => warn!(%peer, error = %err, "failed to spawn worker"),
        }
        true
    }
}

/// Running listener. Dropping the handle stops it.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    workers: Workers,
    shutdown: Option<Sender<()>>,
    acceptor: Option<JoinHandle<()>>,
    reaper: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Bound address (useful with port 0).
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Worker threads not yet reaped.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.workers.lock().len()
    }

    /// Stop accepting and join the accept and reaper threads.
    ///
    /// Workers already serving a connection run to completion.
    pub fn stop(mut self) {
        self.shutdown_threads();
    }

    fn shutdown_threads(&mut self) {
        // dropping the sender disconnects every waiting receiver
        if self.shutdown.take().is_none() {
            return;
        }
        for thread in [self.acceptor.take(), self.reaper.take()].into_iter().flatten() {
            if thread.join().is_err() {
                warn!("listener thread panicked");
            }
        }
        info!(addr = %self.local_addr, "listener stopped");
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("local_addr", &self.local_addr)
            .field("active_workers", &self.active_workers())
            .finish_non_exhaustive()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown_threads();
    }
}
