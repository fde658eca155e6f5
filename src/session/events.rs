//! Session notifications
//!
//! Callbacks run synchronously on the receive thread, in frame arrival
//! order. A slow callback delays every frame behind it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::protocol::{ModemStatus, Response};

/// Severity of a diagnostic log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose diagnostics
    Debug,
    /// Normal operation
    Info,
    /// Recovered problem
    Warning,
    /// Failed operation
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Notification raised by a device session
#[derive(Debug, Clone)]
pub enum Event {
    /// A frame was received and decoded
    FrameReceived(Arc<Response>),
    /// The module reported a modem status change
    ModemStatusChanged(ModemStatus),
    /// Diagnostic message
    Log {
        /// Severity
        level: LogLevel,
        /// Message text
        message: String,
    },
}

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Registered notification callbacks
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback)>>,
}

impl Listeners {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            listeners: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Invoke every callback registered at the time of the call
    pub(crate) fn emit(&self, event: &Event) {
        let snapshot: Vec<Callback> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    /// Emit a log event and mirror it to `tracing`
    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!(target: "xbee::session", "{message}"),
            LogLevel::Info => info!(target: "xbee::session", "{message}"),
            LogLevel::Warning => warn!(target: "xbee::session", "{message}"),
            LogLevel::Error => error!(target: "xbee::session", "{message}"),
        }
        self.emit(&Event::Log { level, message });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Handle to a registered callback.
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::detach`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Unregister the callback. Returns `false` if the session is gone.
    pub fn detach(self) -> bool {
        self.listeners
            .upgrade()
            .is_some_and(|listeners| listeners.remove(self.id))
    }
}
