//! The single-global-lock baseline Stack
//!
//! Every operation takes one Mutex around a plain `Vec`, making the
//! implementation correct by construction. It exists purely as the
//! performance floor for the lock-free variants.

use std::sync::Mutex;

use super::Lifo;

/// A Stack that guards a standard `Vec` with a single global Mutex
#[derive(Debug, Default)]
pub struct SglStack<T> {
    inner: Mutex<Vec<T>>,
}

impl<T> SglStack<T> {
    /// Creates a new empty Stack
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Pushes the Value on top of the Stack
    pub fn push(&self, value: T) {
        let mut inner = self.inner.lock().expect("the Lock is never poisoned");
        inner.push(value);
    }

    /// Attempts to pop the current Top of the Stack
    ///
    /// # Returns
    /// * `Some(value)` with the removed top Element
    /// * `None` if the Stack is empty
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("the Lock is never poisoned");
        inner.pop()
    }

    /// Checks if the Stack is currently empty
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().expect("the Lock is never poisoned");
        inner.is_empty()
    }
}

impl<T> Lifo<T> for SglStack<T> {
    fn push(&self, value: T) {
        SglStack::push(self, value)
    }
    fn pop(&self) -> Option<T> {
        SglStack::pop(self)
    }
    fn is_empty(&self) -> bool {
        SglStack::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop() {
        let stack = SglStack::new();

        stack.push(13);
        assert_eq!(Some(13), stack.pop());
        assert_eq!(None, stack.pop());
    }

    #[test]
    fn lifo_order() {
        let stack = SglStack::new();

        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(Some(3), stack.pop());
        assert_eq!(Some(2), stack.pop());
        assert_eq!(Some(1), stack.pop());
    }

    #[test]
    fn is_empty_stable() {
        let stack = SglStack::<i32>::new();

        assert!(stack.is_empty());
        assert!(stack.is_empty());

        stack.push(1);
        assert!(!stack.is_empty());
        assert!(!stack.is_empty());
    }
}
