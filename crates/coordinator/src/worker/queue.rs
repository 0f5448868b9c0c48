//! Thread-safe FIFO work queue

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Unbounded multi-producer/multi-consumer FIFO
///
/// Consumers use [`try_dequeue`](Self::try_dequeue), which pops and reports
/// emptiness in one step. Checking [`is_empty`](Self::is_empty) first and
/// popping afterwards races with other consumers.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an item at the tail
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Pop the head, or `None` if the queue is empty
    pub fn try_dequeue(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Pop the head and run `claim` on it before the lock is released
    ///
    /// Anyone observing the queue through [`is_empty_and`](Self::is_empty_and)
    /// sees either the item still queued or the effect of `claim`.
    pub fn try_dequeue_claimed<F>(&self, claim: F) -> Option<T>
    where
        F: FnOnce(&T),
    {
        let mut items = self.items.lock();
        let item = items.pop_front()?;
        claim(&item);
        Some(item)
    }

    /// True if the queue is empty and `check` holds, evaluated under the lock
    pub fn is_empty_and<F>(&self, check: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let items = self.items.lock();
        items.is_empty() && check()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
