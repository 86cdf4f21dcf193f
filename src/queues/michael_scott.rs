//! The implementation of the lock-free Michael-Scott Queue
//!
//! # Reference:
//! * [Michael, Scott. Simple, Fast, and Practical Non-Blocking and Blocking Concurrent Queue Algorithms](https://dl.acm.org/doi/10.1145/248052.248106)

use core::mem::{self, MaybeUninit};
use core::sync::atomic::Ordering;

use crossbeam_epoch::{unprotected, Atomic, Owned, Shared};
use crossbeam_utils::{Backoff, CachePadded};

use super::Fifo;

/// The lock-free Michael-Scott Queue
///
/// The Elements are kept in a singly linked chain with a permanent Dummy-Node
/// at the Front. `head` always refers to the Dummy in front of the oldest
/// live Element, `tail` refers to the last Node of the chain or lags one Node
/// behind it, in which case the next operation helps advancing it.
#[derive(Debug)]
pub struct MsQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

#[derive(Debug)]
struct Node<T> {
    /// `MaybeUninit` because the Dummy-Node never carries a Value, every
    /// other Node carries one from its Enqueue until its Dequeue
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

// Safety:
// The Queue hands out every Element at most once, so a single `T` is never
// accessed concurrently and only `Send` is needed for it
unsafe impl<T: Send> Send for MsQueue<T> {}
unsafe impl<T: Send> Sync for MsQueue<T> {}

impl<T> Default for MsQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MsQueue<T> {
    /// Creates a new empty Queue, seeded with its Dummy-Node
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };

        let dummy = Owned::new(Node {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        });
        // # Safety:
        // The Queue is just being created, so no other Thread can access it
        let dummy = dummy.into_shared(unsafe { unprotected() });
        queue.head.store(dummy, Ordering::Relaxed);
        queue.tail.store(dummy, Ordering::Relaxed);

        queue
    }

    /// Enqueues the Value at the Back of the Queue
    pub fn enqueue(&self, value: T) {
        let node = Owned::new(Node {
            data: MaybeUninit::new(value),
            next: Atomic::null(),
        });

        let guard = crossbeam_epoch::pin();
        let node = node.into_shared(&guard);

        let backoff = Backoff::new();
        loop {
            let tail = self.tail.load(Ordering::Acquire, &guard);
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, &guard);

            // A non-null `next` means another Enqueue has linked its Node but
            // not yet advanced `tail`, so help it along first
            if !next.is_null() {
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    &guard,
                );
                continue;
            }

            if tail_ref
                .next
                .compare_exchange(
                    Shared::null(),
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                    &guard,
                )
                .is_ok()
            {
                // The Node is linked, advancing `tail` is allowed to fail
                // because someone else will help
                let _ = self.tail.compare_exchange(
                    tail,
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                    &guard,
                );
                return;
            }
            backoff.spin();
        }
    }

    /// Attempts to dequeue the Element at the Front of the Queue
    ///
    /// # Returns
    /// * `Some(value)` with the removed front Element
    /// * `None` if the Queue was observed to be empty
    pub fn dequeue(&self) -> Option<T> {
        let guard = crossbeam_epoch::pin();
        let backoff = Backoff::new();
        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, &guard);

            let next_ref = unsafe { next.as_ref() }?;

            let tail = self.tail.load(Ordering::Relaxed, &guard);
            if tail == head {
                // An Enqueue linked `next` but did not yet advance `tail`
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    &guard,
                );
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, &guard)
                .is_ok()
            {
                // `next` becomes the new Dummy-Node and `head` is detached.
                //
                // # Safety:
                // `next` sits behind the Dummy, so it was made by an Enqueue
                // and its Value is initialized. Ownership of the Value moves
                // out exactly once because only the Thread whose CAS
                // succeeded gets here for this Node.
                let value = unsafe { next_ref.data.assume_init_read() };
                // # Safety:
                // `head` is unreachable from the Queue and not accessed again
                unsafe { guard.defer_destroy(head) };

                return Some(value);
            }
            backoff.spin();
        }
    }

    /// Checks if the Queue is currently empty
    pub fn is_empty(&self) -> bool {
        let guard = crossbeam_epoch::pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        unsafe { head.deref() }
            .next
            .load(Ordering::Acquire, &guard)
            .is_null()
    }
}

impl<T> Fifo<T> for MsQueue<T> {
    fn enqueue(&self, value: T) {
        MsQueue::enqueue(self, value)
    }
    fn dequeue(&self) -> Option<T> {
        MsQueue::dequeue(self)
    }
    fn is_empty(&self) -> bool {
        MsQueue::is_empty(self)
    }
}

impl<T> Drop for MsQueue<T> {
    fn drop(&mut self) {
        // The Dummy-Node never carries a Value, every following Node does
        let dummy = mem::take(&mut *self.head);

        // # Safety:
        // We have exclusive access through `&mut self` and `dequeue` never
        // frees the current Dummy, so the chain is fully intact
        let mut current = unsafe { dummy.into_owned() }.into_box().next;
        while let Some(node) = unsafe { current.try_into_owned() } {
            let node = node.into_box();
            drop(unsafe { node.data.assume_init() });
            current = node.next;
        }
    }
}
