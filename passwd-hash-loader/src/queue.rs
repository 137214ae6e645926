use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::Error;

/// Unbounded FIFO of password lines waiting to be hashed.
///
/// The loader offers lines and then [`close`](WorkQueue::close)s the queue;
/// workers poll until it yields nothing. A closed, empty queue stays empty,
/// which is what ends the run.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<String>>,
    closed: AtomicBool,
    polled: AtomicUsize,
    changed: Notify,
    drained: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line to the tail. Fails only once the queue is closed.
    pub fn offer(&self, item: String) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::QueueClosed);
        }
        self.items().push_back(item);
        self.changed.notify_one();
        Ok(())
    }

    /// Removes the head, or returns `None` when nothing is queued right now.
    pub fn poll(&self) -> Option<String> {
        let mut items = self.items();
        let item = items.pop_front()?;
        self.polled.fetch_add(1, Ordering::Relaxed);
        if items.is_empty() {
            self.drained.notify_one();
        }
        Some(item)
    }

    /// Advisory only; other threads may change it immediately.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Lines handed out by `poll` so far.
    pub fn polled(&self) -> usize {
        self.polled.load(Ordering::Relaxed)
    }

    /// Signals that no more lines will be offered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.changed.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closed and drained: every further poll returns `None`.
    pub fn is_exhausted(&self) -> bool {
        // closed must be read first, nothing can be offered after it
        self.is_closed() && self.is_empty()
    }

    /// Resolves after the next `offer` or `close`, or immediately if one
    /// happened since the last wait.
    pub async fn wait_for_items(&self) {
        self.changed.notified().await;
    }

    /// Resolves after a poll takes the last queued line. May also resolve for
    /// a drain that was already followed by new offers, so callers re-check.
    pub async fn wait_for_drain(&self) {
        self.drained.notified().await;
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
