//! Bounded multi-producer multi-consumer ingestion queue.
//!
//! The queue decouples the packet pump from the worker pool. Producers
//! never block: a push either lands in the ring or fails immediately so
//! the pump can count the drop and move on. Consumers await quietly on
//! a [`Notify`] until work or closure arrives.
//!
//! Closing is what ends consumption. After [`IngestQueue::close`],
//! new pushes are refused but every entry already accepted is still
//! handed out; [`IngestQueue::pop`] only returns `None` once the queue
//! is both closed and drained. The closed flag and the ring are
//! separate structures, so a push that races `close` may still land;
//! a caller that needs a hard no-pushes-after-close boundary must stop
//! its producers before closing, which is what the server's shutdown
//! sequence does.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;
use tokio::sync::Notify;

/// Bounded MPMC queue with non-blocking producers and awaiting consumers.
#[derive(Debug)]
pub(crate) struct IngestQueue<T> {
    items: ArrayQueue<T>,
    closed: AtomicBool,
    notify: Notify,
}

impl<T> IngestQueue<T> {
    /// Creates a queue holding at most `capacity` entries.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Attempts to enqueue without blocking.
    ///
    /// Returns the entry back to the caller when the queue is full or
    /// already closed. The closed check is advisory: a push concurrent
    /// with [`IngestQueue::close`] may still be accepted, so producers
    /// must be quiesced before closing (see the module docs).
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(item);
        }
        self.items.push(item)?;
        self.notify.notify_one();
        Ok(())
    }

    /// Refuses new entries and wakes every parked consumer.
    ///
    /// Entries already enqueued remain poppable. Idempotent.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Dequeues the next entry, waiting if the queue is empty.
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            if let Some(item) = self.take() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                // A push may have landed between the failed take and the
                // closed check.
                return self.take();
            }

            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            // Re-check after registering so a push or close that landed
            // in between cannot be missed.
            if let Some(item) = self.take() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                return self.take();
            }
            notified.await;
        }
    }

    /// Pops one entry and hands the baton to another parked consumer if
    /// work remains.
    fn take(&self) -> Option<T> {
        let item = self.items.pop();
        if item.is_some() && !self.items.is_empty() {
            self.notify.notify_one();
        }
        item
    }
}
