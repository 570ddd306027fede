//! Bounded FIFO of pending test-case ids with duplicate suppression.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify};

use crate::AgentError;

/// A FIFO that refuses to admit an item already present.
///
/// Order and membership live in one ordered sequence under one lock, so the
/// two can never disagree. Membership lookup scans the sequence; queues are
/// sized to their pool's worker count, so the scan is short.
#[derive(Debug)]
pub struct DedupQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    /// Lock-free mirror of the queue length, for non-blocking reads.
    len: AtomicUsize,
    capacity: Option<usize>,
}

impl<T: Clone + PartialEq> DedupQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Append `item` unless it is already queued. Returns `Ok(true)` when the
    /// item was admitted, `Ok(false)` for a duplicate (a silent no-op), and
    /// `Err(QueueFull)` when a bounded queue is at capacity.
    pub async fn push(&self, item: T) -> Result<bool, AgentError> {
        let mut items = self.items.lock().await;
        if items.contains(&item) {
            return Ok(false);
        }
        if let Some(capacity) = self.capacity {
            if items.len() >= capacity {
                return Err(AgentError::QueueFull(capacity));
            }
        }
        items.push_back(item);
        self.len.store(items.len(), Ordering::Release);
        drop(items);
        self.notify.notify_one();
        Ok(true)
    }

    /// Remove and return the head, waiting until an item is available.
    pub async fn dequeue(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_dequeue().await {
                return item;
            }
            notified.await;
        }
    }

    /// Remove and return the head if one is available right now.
    pub async fn try_dequeue(&self) -> Option<T> {
        let mut items = self.items.lock().await;
        let item = items.pop_front();
        self.len.store(items.len(), Ordering::Release);
        item
    }

    /// Point-in-time membership check, taken under the queue lock.
    pub async fn contains(&self, item: &T) -> bool {
        self.items.lock().await.contains(item)
    }

    /// Snapshot of the items matching `predicate`.
    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.items
            .lock()
            .await
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Drop everything that is queued. Items a worker already holds are
    /// unaffected.
    pub async fn clear(&self) {
        let mut items = self.items.lock().await;
        items.clear();
        self.len.store(0, Ordering::Release);
    }

    /// Eventually-consistent length; never blocks.
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<T: Clone + PartialEq> Default for DedupQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
