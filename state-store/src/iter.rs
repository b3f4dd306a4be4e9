//! Blocking iterator over registry change events
//!
//! - Blocking: `recv()`, `for event in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::ChangeEvent;

/// Blocking iterator over change events for watched keys
///
/// All clones of a store share one receiver, so each event is delivered to
/// exactly one consumer. Everything here is synchronous, which suits a host
/// control loop that is not running inside an async runtime.
///
/// # Example
///
/// ```rust,ignore
/// store.watch("pinpad.");
/// if let Some(event) = store.iter().recv_timeout(Duration::from_secs(1)) {
///     println!("{} is now {}", event.key, event.new_value);
/// }
/// ```
pub struct ChangeIterator {
    rx: Arc<Mutex<mpsc::Receiver<ChangeEvent>>>,
}

impl ChangeIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<ChangeEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until the next event is available
    ///
    /// Returns `None` if the channel is closed.
    pub fn recv(&self) -> Option<ChangeEvent> {
        self.rx.lock().recv().ok()
    }

    /// Block until the next event or until `timeout` expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.rx.lock().recv_timeout(timeout).ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        self.rx.lock().try_recv().ok()
    }

    /// Drain the events queued right now without blocking
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterate until no event arrives within `timeout`
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for ChangeIterator {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

pub struct TryIter<'a> {
    inner: &'a ChangeIterator,
}

impl Iterator for TryIter<'_> {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

pub struct TimeoutIter<'a> {
    inner: &'a ChangeIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIter<'_> {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
