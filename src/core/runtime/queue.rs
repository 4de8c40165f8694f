//! Bounded hand-off queue between detection workers and the UI side.
//!
//! Pushing never blocks: when the queue is full the oldest pending item is
//! dropped so the consumer always sees the most recent ones.

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct LatestQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> LatestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the item evicted to make room, if any.
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let evicted = if items.len() >= self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    /// Oldest pending item, without waiting.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().ok()?.pop_front()
    }

    /// Newest pending item; everything older is discarded.
    pub fn pop_latest(&self) -> Option<T> {
        let mut items = self.items.lock().ok()?;
        let latest = items.pop_back();
        items.clear();
        latest
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut items) = self.items.lock() {
            items.clear();
        }
    }
}
