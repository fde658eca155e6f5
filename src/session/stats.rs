use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NANOSECONDS_PER_MICROSECOND: u128 = 1_000;

/// Per-session traffic and error counters.
#[derive(Debug, Default)]
pub(crate) struct SessionStats {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    framing_errors: AtomicU64,
    decode_errors: AtomicU64,
    unknown_frames: AtomicU64,
    timeouts: AtomicU64,
    exchanges: AtomicU64,
    exchange_latency_total_ns: AtomicU64,
    exchange_latency_max_ns: AtomicU64,
}

impl SessionStats {
    #[inline]
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_unknown_frame(&self) {
        self.unknown_frames.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exchange(&self, latency: Duration) {
        let nanos = latency
            .as_nanos()
            .min(u128::from(u64::MAX))
            .try_into()
            .unwrap_or(u64::MAX);

        self.exchanges.fetch_add(1, Ordering::Relaxed);
        self.exchange_latency_total_ns
            .fetch_add(nanos, Ordering::Relaxed);
        update_max(&self.exchange_latency_max_ns, nanos);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_frames: self.unknown_frames.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            exchange_latency_total_ns: self.exchange_latency_total_ns.load(Ordering::Relaxed),
            exchange_latency_max_ns: self.exchange_latency_max_ns.load(Ordering::Relaxed),
        }
    }
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Point-in-time copy of the session counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests written to the transport
    pub frames_sent: u64,
    /// Bytes written to the transport
    pub bytes_sent: u64,
    /// Frames decoded into a response
    pub frames_received: u64,
    /// Bytes read from the transport
    pub bytes_received: u64,
    /// Receive passes aborted by an unescaped reserved byte
    pub framing_errors: u64,
    /// Valid frames whose body failed to decode
    pub decode_errors: u64,
    /// Valid frames with an API id that has no decoder
    pub unknown_frames: u64,
    /// Exchanges that ran out of time
    pub timeouts: u64,
    /// Completed correlated exchanges
    pub exchanges: u64,
    /// Sum of exchange round-trip times
    pub exchange_latency_total_ns: u64,
    /// Slowest exchange round-trip time
    pub exchange_latency_max_ns: u64,
}

impl StatsSnapshot {
    /// Average exchange round-trip time in microseconds.
    #[must_use]
    pub fn avg_exchange_latency_us(&self) -> Option<u64> {
        if self.exchanges == 0 {
            return None;
        }
        let total_ns = u128::from(self.exchange_latency_total_ns);
        Some((total_ns / (u128::from(self.exchanges) * NANOSECONDS_PER_MICROSECOND)) as u64)
    }
}
