//! Lock-free object pool with owned-guard checkout.
//!
//! This module provides the recycling layer under the server's buffers
//! and codecs. Using `crossbeam-queue::ArrayQueue` for the idle list
//! keeps checkout and return lock-free, so workers never contend on a
//! mutex in the hot path.
//!
//! Checkout hands back a [`Pooled`] guard that owns the value and
//! returns it to the pool on drop. That makes "return exactly once" a
//! property of ownership instead of programmer discipline: whichever
//! task ends up holding the guard, the value goes back when the guard
//! dies.
//!
//! The pool never blocks and never fails:
//!
//! - `acquire` on an empty idle list builds a fresh value, so the
//!   number of live values is bounded only by concurrent demand.
//! - returning to a full idle list drops the value, so the idle list
//!   never grows past its configured capacity.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gust::ObjectPool;
//!
//! let pool = Arc::new(ObjectPool::new(64, || Vec::<u8>::with_capacity(1024)));
//!
//! let mut value = pool.acquire();
//! value.extend_from_slice(b"scratch");
//! drop(value); // returned to the pool
//!
//! assert_eq!(pool.allocations(), 1);
//! assert_eq!(pool.returns(), 1);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;

/// A lock-free pool of reusable values.
///
/// `build` is invoked whenever a caller acquires from an empty idle
/// list, so the pool warms up lazily under real load.
pub struct ObjectPool<T> {
    idle: ArrayQueue<T>,
    build: Box<dyn Fn() -> T + Send + Sync>,
    allocations: AtomicU64,
    reuses: AtomicU64,
    returns: AtomicU64,
    discards: AtomicU64,
}

impl<T> ObjectPool<T> {
    /// Creates a pool whose idle list holds at most `capacity` values.
    pub fn new(capacity: usize, build: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            idle: ArrayQueue::new(capacity),
            build: Box::new(build),
            allocations: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            discards: AtomicU64::new(0),
        }
    }

    /// Checks a value out of the pool, building a fresh one if the idle
    /// list is empty. Never blocks, never fails.
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let value = match self.idle.pop() {
            Some(value) => {
                self.reuses.fetch_add(1, Ordering::Relaxed);
                value
            }
            None => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                (self.build)()
            }
        };
        Pooled {
            value: Some(value),
            pool: Arc::clone(self),
        }
    }

    /// Number of values idling in the pool right now.
    pub fn idle_len(&self) -> usize {
        self.idle.len()
    }

    /// How many acquires had to build a fresh value.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// How many acquires were served from the idle list.
    pub fn reuses(&self) -> u64 {
        self.reuses.load(Ordering::Relaxed)
    }

    /// How many values made it back into the idle list.
    pub fn returns(&self) -> u64 {
        self.returns.load(Ordering::Relaxed)
    }

    /// How many values were dropped because the idle list was full.
    pub fn discards(&self) -> u64 {
        self.discards.load(Ordering::Relaxed)
    }

    fn release(&self, value: T) {
        if self.idle.push(value).is_ok() {
            self.returns.fetch_add(1, Ordering::Relaxed);
        } else {
            self.discards.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.idle.len())
            .field("capacity", &self.idle.capacity())
            .finish()
    }
}

/// Owning guard for a pooled value. Returns the value on drop.
#[derive(Debug)]
pub struct Pooled<T> {
    value: Option<T>,
    pool: Arc<ObjectPool<T>>,
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("pooled value present until drop")
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("pooled value present until drop")
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}
