//! The implementation of the lock-free Treiber-Stack
//!
//! # Reference:
//! * [R. K. Treiber. Systems Programming: Coping with Parallelism](https://dominoweb.draco.res.ibm.com/58319a2ed2b1078985257003004617ef.html)

use core::mem::ManuallyDrop;
use core::ptr;
use core::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Owned, Shared};
use crossbeam_utils::Backoff;

use super::Lifo;

/// The lock-free Treiber-Stack
///
/// All Elements are stored in a singly linked chain of Nodes hanging off a
/// single atomic `top` pointer, which every Push and Pop updates with a CAS
/// retry loop. Usable with any number of concurrent Threads.
#[derive(Debug)]
pub struct TreiberStack<T> {
    top: Atomic<Node<T>>,
}

#[derive(Debug)]
struct Node<T> {
    data: ManuallyDrop<T>,
    /// Points towards the Bottom of the Stack, so the chain reachable from
    /// `top` is exactly the set of live Elements in LIFO order
    down: *const Node<T>,
}

// Safety:
// The Stack hands out every Element at most once, so a single `T` is never
// accessed concurrently and only `Send` is needed for it
unsafe impl<T: Send> Send for TreiberStack<T> {}
unsafe impl<T: Send> Sync for TreiberStack<T> {}

impl<T> Default for TreiberStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreiberStack<T> {
    /// Creates a new empty Stack
    pub fn new() -> Self {
        Self {
            top: Atomic::null(),
        }
    }

    /// Pushes the Value on top of the Stack
    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            data: ManuallyDrop::new(value),
            down: ptr::null(),
        });

        let guard = crossbeam_epoch::pin();
        let backoff = Backoff::new();
        loop {
            let top = self.top.load(Ordering::Relaxed, &guard);
            node.down = top.as_raw();

            // A failed CAS means another Thread updated `top` in between, in
            // that case we back off and retry with the new `top`
            match self
                .top
                .compare_exchange(top, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => return,
                Err(err) => node = err.new,
            }
            backoff.spin();
        }
    }

    /// Attempts to pop the current Top of the Stack
    ///
    /// # Returns
    /// * `Some(value)` with the removed top Element
    /// * `None` if the Stack was observed to be empty
    pub fn pop(&self) -> Option<T> {
        let guard = crossbeam_epoch::pin();
        let backoff = Backoff::new();
        loop {
            let top = self.top.load(Ordering::Acquire, &guard);
            let top_ref = unsafe { top.as_ref() }?;
            let down = Shared::from(top_ref.down);

            if self
                .top
                .compare_exchange(top, down, Ordering::Relaxed, Ordering::Relaxed, &guard)
                .is_ok()
            {
                // The CAS detached `top` from the Stack, so no other Thread
                // can reach it anymore through `self.top`.
                //
                // # Safety:
                // Ownership of `data` is moved out exactly once, because only
                // the one Thread whose CAS succeeded gets here for this Node.
                // The Node itself may still be read by Threads that loaded
                // `top` earlier and is therefore only reclaimed through the
                // epoch mechanism.
                let data = ManuallyDrop::into_inner(unsafe { ptr::read(&top_ref.data) });
                unsafe { guard.defer_destroy(top) };

                return Some(data);
            }
            backoff.spin();
        }
    }

    /// Checks if the Stack is currently empty
    pub fn is_empty(&self) -> bool {
        let guard = crossbeam_epoch::pin();
        self.top.load(Ordering::Acquire, &guard).is_null()
    }
}

impl<T> Lifo<T> for TreiberStack<T> {
    fn push(&self, value: T) {
        TreiberStack::push(self, value)
    }
    fn pop(&self) -> Option<T> {
        TreiberStack::pop(self)
    }
    fn is_empty(&self) -> bool {
        TreiberStack::is_empty(self)
    }
}

impl<T> Drop for TreiberStack<T> {
    fn drop(&mut self) {
        let mut current = core::mem::take(&mut self.top);

        // # Safety:
        // We have exclusive access through `&mut self`, so no other Thread
        // can still observe any of the Nodes in the chain
        while let Some(mut node) = unsafe { current.try_into_owned() }.map(Owned::into_box) {
            unsafe { ManuallyDrop::drop(&mut node.data) };
            current = node.down.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn pop_empty() {
        let stack = TreiberStack::<u8>::new();

        assert_eq!(None, stack.pop());
        assert!(stack.is_empty());
    }

    #[test]
    fn push_pop() {
        let stack = TreiberStack::new();

        stack.push(13);
        assert!(!stack.is_empty());
        assert_eq!(Some(13), stack.pop());
        assert!(stack.is_empty());
    }

    #[test]
    fn lifo_order() {
        let stack = TreiberStack::new();

        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(Some(3), stack.pop());
        assert_eq!(Some(2), stack.pop());
        assert_eq!(Some(1), stack.pop());
        assert_eq!(None, stack.pop());
    }

    #[test]
    fn concurrent_push_pop() {
        let stack = TreiberStack::new();

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for i in 0..1000 {
                        stack.push(i);
                        assert!(stack.pop().is_some());
                    }
                });
            }
        });

        assert!(stack.is_empty());
    }

    #[test]
    fn drop_with_leftover_elements() {
        let stack = TreiberStack::new();

        for i in 0..64 {
            stack.push(Box::new(i));
        }
        // The remaining Boxes are cleaned up by the Drop impl
    }
}
