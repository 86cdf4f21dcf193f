//! The single-global-lock baseline Queue
//!
//! The FIFO counterpart to [`SglStack`](crate::stacks::sgl::SglStack), one
//! Mutex around a plain `VecDeque`.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::Fifo;

/// A Queue that guards a standard `VecDeque` with a single global Mutex
#[derive(Debug, Default)]
pub struct SglQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> SglQueue<T> {
    /// Creates a new empty Queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues the Value at the Back of the Queue
    pub fn enqueue(&self, value: T) {
        let mut inner = self.inner.lock().expect("the Lock is never poisoned");
        inner.push_back(value);
    }

    /// Attempts to dequeue the Element at the Front of the Queue
    ///
    /// # Returns
    /// * `Some(value)` with the removed front Element
    /// * `None` if the Queue is empty
    pub fn dequeue(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("the Lock is never poisoned");
        inner.pop_front()
    }

    /// Checks if the Queue is currently empty
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().expect("the Lock is never poisoned");
        inner.is_empty()
    }
}

impl<T> Fifo<T> for SglQueue<T> {
    fn enqueue(&self, value: T) {
        SglQueue::enqueue(self, value)
    }
    fn dequeue(&self) -> Option<T> {
        SglQueue::dequeue(self)
    }
    fn is_empty(&self) -> bool {
        SglQueue::is_empty(self)
    }
}
