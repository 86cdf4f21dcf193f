//! The implementation of the lock-free Basket-Queue
//!
//! The Queue keeps the Michael-Scott structure (Dummy-Node, lazily advanced
//! Tail) but relaxes it in two ways to take contention off the hot pointers:
//!
//! * Enqueues that lose the race for the Tail slot do not retry from the new
//!   Tail. As long as the contended slot still carries the expected
//!   generation Tag and no deletion mark, they link their Node right there,
//!   forming a "Basket" of concurrently inserted Nodes. Order inside one
//!   Basket is unspecified, order across Baskets stays FIFO.
//! * Dequeues only mark Nodes as deleted and skip over already marked ones.
//!   Once a Dequeue skipped [`MAX_HOPS`] marked Nodes, or the marked run
//!   reaches the Tail, the whole run is unlinked with one CAS on `head` and
//!   handed to the epoch collector.
//!
//! # Reference:
//! * [Hoffman, Shalev, Shavit. The Baskets Queue](https://link.springer.com/chapter/10.1007/978-3-540-77096-1_29)

use core::mem::MaybeUninit;
use core::sync::atomic::Ordering;

use crossbeam_epoch::Guard;
use crossbeam_utils::{Backoff, CachePadded};

use super::Fifo;

mod tagged;
use tagged::{AtomicTagged, TaggedPtr};

/// How many deletion marks a single Dequeue may skip over before it unlinks
/// and reclaims the marked run
const MAX_HOPS: usize = 3;

/// The lock-free Basket-Queue
#[derive(Debug)]
pub struct BasketQueue<T> {
    head: CachePadded<AtomicTagged<Node<T>>>,
    tail: CachePadded<AtomicTagged<Node<T>>>,
}

#[derive(Debug)]
struct Node<T> {
    /// `MaybeUninit` because the Dummy-Node never carries a Value and every
    /// other Node loses its Value again when a Dequeue claims it
    data: MaybeUninit<T>,
    /// The deletion mark packed into this link refers to the successor Node
    next: AtomicTagged<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(data: MaybeUninit<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            data,
            next: AtomicTagged::null(0),
        }))
    }
}

// Safety:
// The deletion CAS hands out every Value at most once, so a single `T` is
// never accessed concurrently and only `Send` is needed for it
unsafe impl<T: Send> Send for BasketQueue<T> {}
unsafe impl<T: Send> Sync for BasketQueue<T> {}

impl<T> Default for BasketQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BasketQueue<T> {
    /// Creates a new empty Queue, seeded with its Dummy-Node
    pub fn new() -> Self {
        let dummy = Node::alloc(MaybeUninit::uninit());
        Self {
            head: CachePadded::new(AtomicTagged::new(TaggedPtr::new(dummy, false, 0))),
            tail: CachePadded::new(AtomicTagged::new(TaggedPtr::new(dummy, false, 0))),
        }
    }

    /// Enqueues the Value at the Back of the Queue
    pub fn enqueue(&self, value: T) {
        let node = Node::alloc(MaybeUninit::new(value));

        // Pinned for the Node derefs, concurrent Dequeues may reclaim chains
        let _guard = crossbeam_epoch::pin();
        let backoff = Backoff::new();
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            // The Tail is never null, it always at least refers to the Dummy
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire);

            if self.tail.load(Ordering::Acquire).as_ptr() != tail.as_ptr() {
                continue;
            }

            if next.is_null() {
                // Pre-set our own link to the generation the Queue will be
                // at once this Node has become the Tail
                let link = TaggedPtr::null(tail.tag().wrapping_add(2));
                unsafe { (*node).next.store(link, Ordering::Relaxed) };

                let new = TaggedPtr::new(node, false, tail.tag().wrapping_add(1));
                match tail_ref
                    .next
                    .compare_exchange(next, new, Ordering::Release, Ordering::Acquire)
                {
                    Ok(_) => {
                        let _ = self.tail.compare_exchange(
                            tail,
                            new,
                            Ordering::Release,
                            Ordering::Relaxed,
                        );
                        return;
                    }
                    Err(mut current) => {
                        // Another Enqueue won the slot and thereby opened a
                        // Basket. Join it as long as the slot still carries
                        // the generation of that race and no deletion mark
                        while current.tag() == tail.tag().wrapping_add(1) && !current.deleted() {
                            backoff.spin();
                            unsafe { (*node).next.store(current, Ordering::Relaxed) };
                            if tail_ref
                                .next
                                .compare_exchange(
                                    current,
                                    new,
                                    Ordering::Release,
                                    Ordering::Acquire,
                                )
                                .is_ok()
                            {
                                return;
                            }
                            current = tail_ref.next.load(Ordering::Acquire);
                        }
                    }
                }
            } else {
                // The Tail lags behind, walk to the last Node and help
                // advancing before retrying
                let mut last = next;
                let mut last_next = unsafe { last.deref() }.next.load(Ordering::Acquire);
                while !last_next.is_null()
                    && self.tail.load(Ordering::Acquire).as_ptr() == tail.as_ptr()
                {
                    last = last_next;
                    last_next = unsafe { last.deref() }.next.load(Ordering::Acquire);
                }

                let _ = self.tail.compare_exchange(
                    tail,
                    TaggedPtr::new(last.as_ptr(), false, tail.tag().wrapping_add(1)),
                    Ordering::Release,
                    Ordering::Relaxed,
                );
            }
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
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let mut next = unsafe { head.deref() }.next.load(Ordering::Acquire);

            if self.head.load(Ordering::Acquire) != head {
                continue;
            }

            if head.as_ptr() == tail.as_ptr() {
                if next.is_null() {
                    return None;
                }

                // Not actually empty, the Tail just lags behind. Walk to the
                // last Node and help advancing before retrying
                let mut last = next;
                let mut last_next = unsafe { last.deref() }.next.load(Ordering::Acquire);
                while !last_next.is_null()
                    && self.tail.load(Ordering::Acquire).as_ptr() == tail.as_ptr()
                {
                    last = last_next;
                    last_next = unsafe { last.deref() }.next.load(Ordering::Acquire);
                }

                let _ = self.tail.compare_exchange(
                    tail,
                    TaggedPtr::new(last.as_ptr(), false, tail.tag().wrapping_add(1)),
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                continue;
            }

            // Skip over the run of already deleted Nodes behind the Dummy
            let mut iter = head;
            let mut hops = 0;
            while next.deleted()
                && iter.as_ptr() != tail.as_ptr()
                && self.head.load(Ordering::Acquire) == head
            {
                iter = next;
                next = unsafe { iter.deref() }.next.load(Ordering::Acquire);
                hops += 1;
            }

            if self.head.load(Ordering::Acquire) != head {
                continue;
            } else if iter.as_ptr() == tail.as_ptr() {
                // Everything up to the Tail is deleted, only reclamation is
                // left to do
                self.free_chain(head, iter, &guard);
            } else {
                let claimed = TaggedPtr::new(next.as_ptr(), true, next.tag().wrapping_add(1));
                if unsafe { iter.deref() }
                    .next
                    .compare_exchange(next, claimed, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    // # Safety:
                    // The deletion CAS bumped the Tag, so exactly one Thread
                    // gets here per Node and takes sole ownership of the
                    // Value. The Node itself stays linked until `free_chain`
                    // unlinks it.
                    let value = unsafe { next.deref().data.assume_init_read() };

                    if hops >= MAX_HOPS {
                        self.free_chain(head, next, &guard);
                    }
                    return Some(value);
                }
                backoff.spin();
            }
        }
    }

    /// Checks if the Queue is currently empty
    ///
    /// Nodes that are only marked deleted but still awaiting reclamation do
    /// not count, the Queue is empty once no live Element is linked anymore
    pub fn is_empty(&self) -> bool {
        let _guard = crossbeam_epoch::pin();
        let mut current = self.head.load(Ordering::Acquire);
        loop {
            let next = unsafe { current.deref() }.next.load(Ordering::Acquire);
            if next.is_null() {
                return true;
            }
            // The mark in this link means the successor was already claimed
            // by a Dequeue, so it no longer counts as an Element
            if !next.deleted() {
                return false;
            }
            current = next;
        }
    }

    /// Swings `head` from `from` past the deleted run up to `to` in one CAS
    /// and hands the unlinked Nodes to the epoch collector
    ///
    /// `to` becomes the new Dummy-Node, its Value was already consumed by the
    /// Dequeue that marked it
    fn free_chain(&self, from: TaggedPtr<Node<T>>, to: TaggedPtr<Node<T>>, guard: &Guard) {
        let replacement = TaggedPtr::new(to.as_ptr(), false, from.tag().wrapping_add(1));
        if self
            .head
            .compare_exchange(from, replacement, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            // Another Thread already advanced `head` and with it took over
            // the reclamation of the run
            return;
        }

        let mut current = from.as_ptr();
        while current != to.as_ptr() {
            let next = unsafe { (*current).next.load(Ordering::Relaxed) };
            // # Safety:
            // The run is unlinked from the Queue, only Threads that loaded
            // `head` before the CAS can still read these Nodes and they are
            // epoch protected. Every Node in the run carries a deletion
            // mark, so its Value was already moved out and only the
            // allocation itself is left to free.
            unsafe {
                guard.defer_unchecked(move || {
                    drop(Box::from_raw(current));
                })
            };
            current = next.as_ptr();
        }
    }
}

impl<T> Fifo<T> for BasketQueue<T> {
    fn enqueue(&self, value: T) {
        BasketQueue::enqueue(self, value)
    }
    fn dequeue(&self) -> Option<T> {
        BasketQueue::dequeue(self)
    }
    fn is_empty(&self) -> bool {
        BasketQueue::is_empty(self)
    }
}

impl<T> Drop for BasketQueue<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed).as_ptr();
        // The Dummy-Node at `head` never carries a live Value
        let mut deleted = true;

        // # Safety:
        // We have exclusive access through `&mut self`, so no other Thread
        // can still observe any of the Nodes in the chain
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            let next = node.next.load(Ordering::Relaxed);

            if !deleted {
                drop(unsafe { node.data.assume_init() });
            }

            // The deletion mark in this link refers to the successor
            deleted = next.deleted();
            current = next.as_ptr();
        }
    }
}
