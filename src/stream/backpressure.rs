//! Backpressure handling for discovered tokens
//!
//! Create events arrive in bursts. The listener hands decoded tokens to the
//! engine through a bounded channel whose overflow behavior is configurable,
//! so a slow consumer cannot grow memory without bound.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// What to do when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Wait for space
    #[default]
    Block,
    /// Evict the oldest queued item to admit the new one
    DropOldest,
    /// Discard the incoming item
    DropNewest,
}

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer channel with an overflow policy
pub struct BackpressureChannel<T> {
    capacity: usize,
    drop_policy: DropPolicy,
    state: Mutex<State<T>>,
    items: Notify,
    space: Notify,
    dropped_count: AtomicU64,
}

impl<T: Send> BackpressureChannel<T> {
    pub fn new(capacity: usize, drop_policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            drop_policy,
            state: Mutex::new(State {
                buffer: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            items: Notify::new(),
            space: Notify::new(),
            dropped_count: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send an item, applying the drop policy when full
    ///
    /// Fails only when the channel is closed. A dropped item still counts as
    /// sent.
    pub async fn send(&self, item: T) -> Result<()> {
        let mut item = Some(item);

        loop {
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.closed {
                    return Err(Error::QueueClosed);
                }

                if state.buffer.len() < self.capacity {
                    if let Some(item) = item.take() {
                        state.buffer.push_back(item);
                    }
                    drop(state);
                    self.items.notify_one();
                    return Ok(());
                }

                match self.drop_policy {
                    DropPolicy::DropNewest => {
                        self.dropped_count.fetch_add(1, Ordering::Relaxed);
                        debug!("Dropped newest item due to backpressure");
                        return Ok(());
                    }
                    DropPolicy::DropOldest => {
                        state.buffer.pop_front();
                        if let Some(item) = item.take() {
                            state.buffer.push_back(item);
                        }
                        self.dropped_count.fetch_add(1, Ordering::Relaxed);
                        debug!("Dropped oldest item due to backpressure");
                        drop(state);
                        self.items.notify_one();
                        return Ok(());
                    }
                    DropPolicy::Block => {
                        debug!("Backpressure channel is full, blocking");
                    }
                }
            }

            notified.await;
        }
    }

    /// Receive the next item; `None` once closed and drained
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.buffer.pop_front() {
                    drop(state);
                    self.space.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Receive without waiting
    pub fn try_recv(&self) -> Option<T> {
        let item = self.state().buffer.pop_front();
        if item.is_some() {
            self.space.notify_one();
        }
        item
    }

    /// Close the channel. Returns false if it was already closed.
    ///
    /// Queued items remain receivable; blocked senders fail.
    pub fn close(&self) -> bool {
        {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            state.closed = true;
        }

        let dropped = self.dropped_count();
        if dropped > 0 {
            warn!("Backpressure channel closed after dropping {} items", dropped);
        }
        self.items.notify_waiters();
        self.space.notify_waiters();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items discarded by the drop policy
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get utilization percentage
    pub fn utilization(&self) -> f64 {
        (self.len() as f64 / self.capacity as f64) * 100.0
    }
}
