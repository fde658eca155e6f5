//! Request/response correlation
//!
//! At most one correlated exchange is outstanding per session. The caller
//! reserves the slot with [`ExchangeCoordinator::begin`] before writing the
//! request, so a response racing the write is never missed; the receive
//! thread completes it with [`ExchangeCoordinator::complete`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;

use crate::protocol::{Error, NO_RESPONSE_FRAME_ID, Response, Result};

struct Pending {
    frame_id: u8,
    tx: Sender<Arc<Response>>,
}

/// Frame id allocator and pending-exchange slot
#[derive(Default)]
pub(crate) struct ExchangeCoordinator {
    last_frame_id: AtomicU8,
    pending: Mutex<Option<Pending>>,
}

/// Successor of `id` in 1..=255, skipping the no-response id
const fn successor(id: u8) -> u8 {
    match id.wrapping_add(1) {
        NO_RESPONSE_FRAME_ID => 1,
        next => next,
    }
}

impl ExchangeCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate the next frame id
    pub(crate) fn next_frame_id(&self) -> u8 {
        let previous = self
            .last_frame_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| Some(successor(id)))
            .unwrap_or_else(|id| id);
        successor(previous)
    }

    /// Reserve the pending slot under a fresh frame id
    pub(crate) fn begin(&self) -> Result<PendingExchange<'_>> {
        let mut pending = self.pending.lock();
        if let Some(current) = pending.as_ref() {
            return Err(Error::ExchangeInProgress {
                frame_id: current.frame_id,
            });
        }

        let frame_id = self.next_frame_id();
        let (tx, rx) = bounded(1);
        *pending = Some(Pending { frame_id, tx });
        Ok(PendingExchange {
            coordinator: self,
            frame_id,
            rx,
        })
    }

    /// Hand `response` to the pending exchange if its correlation id matches.
    ///
    /// Returns `true` when an exchange was completed.
    pub(crate) fn complete(&self, response: &Arc<Response>) -> bool {
        let Some(frame_id) = response.correlation_id() else {
            return false;
        };

        let mut pending = self.pending.lock();
        match pending.as_ref() {
            Some(current) if current.frame_id == frame_id => {}
            _ => return false,
        }
        let Some(current) = pending.take() else {
            return false;
        };
        current.tx.try_send(Arc::clone(response)).is_ok()
    }

    /// Drop the pending exchange; its waiter fails immediately
    pub(crate) fn cancel(&self) {
        self.pending.lock().take();
    }

    /// Frame id of the outstanding exchange
    pub(crate) fn pending_frame_id(&self) -> Option<u8> {
        self.pending.lock().as_ref().map(|p| p.frame_id)
    }
}

/// Reservation of the pending slot; releases it when dropped.
pub(crate) struct PendingExchange<'a> {
    coordinator: &'a ExchangeCoordinator,
    frame_id: u8,
    rx: Receiver<Arc<Response>>,
}

impl PendingExchange<'_> {
    pub(crate) const fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// Block until the matching response arrives or `timeout` elapses
    pub(crate) fn wait(self, timeout: Duration) -> Result<Arc<Response>> {
        match self.rx.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout {
                frame_id: self.frame_id,
                waited: timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(Error::InvalidState { state: "closed" }),
        }
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        let mut pending = self.coordinator.pending.lock();
        if pending.as_ref().is_some_and(|p| p.frame_id == self.frame_id) {
            *pending = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::thread;
    use std::time::Instant;

    fn at_response(frame_id: u8) -> Arc<Response> {
        let payload = Bytes::from(vec![0x88, frame_id, b'D', b'B', 0x00, 0x30]);
        Arc::new(Response::decode(payload).unwrap().unwrap())
    }

    #[test]
    fn test_frame_ids_wrap_past_zero() {
        let coordinator = ExchangeCoordinator::new();
        assert_eq!(coordinator.next_frame_id(), 1);
        for _ in 2..=255 {
            coordinator.next_frame_id();
        }
        assert_eq!(coordinator.next_frame_id(), 1);
        assert_eq!(coordinator.next_frame_id(), 2);
    }

    #[test]
    fn test_matching_response_completes() {
        let coordinator = ExchangeCoordinator::new();
        let pending = coordinator.begin().unwrap();
        let response = at_response(pending.frame_id());

        assert!(coordinator.complete(&response));
        let got = pending.wait(Duration::from_millis(100)).unwrap();
        assert!(Arc::ptr_eq(&got, &response));
        assert_eq!(coordinator.pending_frame_id(), None);
    }

    #[test]
    fn test_mismatched_id_keeps_waiting() {
        let coordinator = ExchangeCoordinator::new();
        let pending = coordinator.begin().unwrap();
        let other = at_response(pending.frame_id().wrapping_add(1));

        assert!(!coordinator.complete(&other));
        assert_eq!(coordinator.pending_frame_id(), Some(pending.frame_id()));
    }

    #[test]
    fn test_uncorrelated_response_ignored() {
        let coordinator = ExchangeCoordinator::new();
        let _pending = coordinator.begin().unwrap();
        let status = Arc::new(Response::decode(Bytes::from_static(&[0x8A, 0x02])).unwrap().unwrap());
        assert!(!coordinator.complete(&status));
    }

    #[test]
    fn test_timeout_clears_slot() {
        let coordinator = ExchangeCoordinator::new();
        let pending = coordinator.begin().unwrap();
        let frame_id = pending.frame_id();

        let started = Instant::now();
        let result = pending.wait(Duration::from_millis(50));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(matches!(result, Err(Error::Timeout { frame_id: id, .. }) if id == frame_id));
        assert_eq!(coordinator.pending_frame_id(), None);

        // a late response is not delivered anywhere
        assert!(!coordinator.complete(&at_response(frame_id)));
    }

    #[test]
    fn test_second_exchange_rejected() {
        let coordinator = ExchangeCoordinator::new();
        let first = coordinator.begin().unwrap();
        let second = coordinator.begin();
        assert!(matches!(
            second,
            Err(Error::ExchangeInProgress { frame_id }) if frame_id == first.frame_id()
        ));

        drop(first);
        assert!(coordinator.begin().is_ok());
    }

    #[test]
    fn test_completion_from_another_thread() {
        let coordinator = Arc::new(ExchangeCoordinator::new());
        let pending = coordinator.begin().unwrap();
        let response = at_response(pending.frame_id());

        let completer = {
            let coordinator = Arc::clone(&coordinator);
            let response = Arc::clone(&response);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                coordinator.complete(&response)
            })
        };

        let got = pending.wait(Duration::from_secs(2)).unwrap();
        assert!(completer.join().unwrap());
        assert!(Arc::ptr_eq(&got, &response));
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let coordinator = ExchangeCoordinator::new();
        let pending = coordinator.begin().unwrap();
        coordinator.cancel();
        assert!(matches!(
            pending.wait(Duration::from_secs(1)),
            Err(Error::InvalidState { .. })
        ));
    }
}
