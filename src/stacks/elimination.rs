//! The Elimination-Backoff layer for Stacks
//!
//! A Push and a Pop that run at the same Time do not actually need the
//! Stack: the Pop can simply consume the Value the Push is currently trying
//! to insert. This module implements that idea with a single collision slot
//! holding an in-flight operation descriptor. Operations first try to pair
//! up against the slot and only fall back to the backing Stack if no partner
//! shows up in time, which takes pressure off the shared top pointer under
//! high concurrency.
//!
//! Eliminated pairs trade away perfect LIFO order, the paired Value need not
//! be the most recently pushed one.
//!
//! # Reference:
//! * [Hendler, Shavit, Yerushalmi. A Scalable Lock-free Stack Algorithm](https://dl.acm.org/doi/10.1145/1007912.1007944)

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use crossbeam_utils::Backoff;

use super::{treiber::TreiberStack, Lifo};

/// Upper bound on the number of Elements that may be in flight through the
/// combination of collision slot and backing Stack at once. Above this the
/// slot is bypassed and operations go straight to the backing Stack.
const MAX_ELIM_SIZE: usize = 100;

/// The descriptor is freshly published and waiting for a partner
const WAITING: usize = 0;
/// A partner won the right to exchange and is currently moving the Value
const CLAIMED: usize = 1;
/// The exchange is complete, the descriptor owner may finish its operation
const MATCHED: usize = 2;
/// The owner withdrew the descriptor before a partner claimed it
const CANCELLED: usize = 3;

#[derive(Debug, PartialEq)]
enum Kind {
    Push,
    Pop,
}

/// An in-flight operation published in the collision slot
struct Request<T> {
    kind: Kind,
    state: AtomicUsize,
    /// `Some` from the start for a Push, filled in by the partner for a Pop
    value: UnsafeCell<Option<T>>,
}

impl<T> Request<T> {
    fn new(kind: Kind, value: Option<T>) -> Self {
        Self {
            kind,
            state: AtomicUsize::new(WAITING),
            value: UnsafeCell::new(value),
        }
    }
}

/// A Stack layering elimination over some backing Stack `S`
///
/// The backing Stack is usually either a [`TreiberStack`] or an
/// [`SglStack`](super::sgl::SglStack), both pairings behave identically from
/// the outside.
#[derive(Debug)]
pub struct ElimStack<T, S = TreiberStack<T>> {
    backing: S,
    slot: Atomic<Request<T>>,
    /// Tracks Pushes minus successful Pops for the in-flight bound
    depth: AtomicUsize,
    /// How often an operation fell through to the backing Stack
    fallbacks: AtomicUsize,
}

// Safety:
// The collision slot transfers each Value exactly once, guarded by the
// descriptor state machine, so a single `T` is never accessed concurrently
unsafe impl<T: Send, S: Send> Send for ElimStack<T, S> {}
unsafe impl<T: Send, S: Sync> Sync for ElimStack<T, S> {}

impl<T, S: Default> Default for ElimStack<T, S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<T, S> ElimStack<T, S> {
    /// Creates a new empty Stack with the given backing Stack
    pub fn new(backing: S) -> Self {
        Self {
            backing,
            slot: Atomic::null(),
            depth: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
        }
    }

    /// Gives access to the backing Stack
    pub fn backing(&self) -> &S {
        &self.backing
    }

    /// The number of operations that could not be eliminated and fell
    /// through to the backing Stack so far
    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

impl<T, S> ElimStack<T, S>
where
    S: Lifo<T>,
{
    /// Pushes the Value on top of the Stack
    ///
    /// The Value either gets handed directly to a concurrently running
    /// [`pop`](Self::pop) or ends up on the backing Stack
    pub fn push(&self, value: T) {
        if self.depth.fetch_add(1, Ordering::Relaxed) >= MAX_ELIM_SIZE {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            self.backing.push(value);
            return;
        }

        let guard = crossbeam_epoch::pin();
        match self.try_eliminate_push(value, &guard) {
            Ok(()) => (),
            Err(value) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.backing.push(value);
            }
        }
    }

    /// Attempts to pop the current Top of the Stack
    ///
    /// # Returns
    /// * `Some(value)`, taken either from a concurrently running Push or
    ///   from the backing Stack
    /// * `None` if no partner showed up and the backing Stack was observed
    ///   to be empty
    pub fn pop(&self) -> Option<T> {
        let guard = crossbeam_epoch::pin();

        // A Push may already be waiting in the slot, in that case we can
        // consume its Value without ever touching the backing Stack
        if let Some(value) = self.try_claim_push(&guard) {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Some(value);
        }

        if let Some(value) = self.backing.pop() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Some(value);
        }

        // The backing Stack looked empty, so advertise the Pop in the slot
        // and give a concurrent Push a short window to hand its Value over
        match self.wait_for_push(&guard) {
            Some(value) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Some(value)
            }
            None => None,
        }
    }

    /// Checks if the backing Stack is currently empty
    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    /// Tries to get rid of the Value through the collision slot
    ///
    /// # Returns
    /// * `Ok(())` if the Value was handed to a Pop
    /// * `Err(value)` if the caller has to push onto the backing Stack
    fn try_eliminate_push(&self, value: T, guard: &Guard) -> Result<(), T> {
        let slot = self.slot.load(Ordering::Acquire, guard);

        if let Some(partner) = unsafe { slot.as_ref() } {
            // Only a waiting Pop is a compatible partner, a second Push just
            // falls through to the backing Stack
            if partner.kind == Kind::Pop
                && partner
                    .state
                    .compare_exchange(WAITING, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                // # Safety:
                // The CLAIMED transition made us the only Thread with access
                // to the cell until we publish MATCHED
                unsafe { *partner.value.get() = Some(value) };
                partner.state.store(MATCHED, Ordering::Release);

                let _ = self.slot.compare_exchange(
                    slot,
                    Shared::null(),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                    guard,
                );
                return Ok(());
            }

            return Err(value);
        }

        // Slot is free, publish our own descriptor and wait for a Pop
        let request = Owned::new(Request::new(Kind::Push, Some(value)));
        let published = match self.slot.compare_exchange(
            Shared::null(),
            request,
            Ordering::AcqRel,
            Ordering::Relaxed,
            guard,
        ) {
            Ok(shared) => shared,
            Err(err) => {
                // Lost the race for the slot, take the Value back out
                let request = err.new.into_box();
                let value = request
                    .value
                    .into_inner()
                    .expect("a Push descriptor always carries its Value");
                return Err(value);
            }
        };

        let request_ref = unsafe { published.deref() };
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            if request_ref.state.load(Ordering::Acquire) == MATCHED {
                self.retire_request(published, guard);
                return Ok(());
            }
            backoff.spin();
        }

        // No Pop showed up in time, withdraw the descriptor again
        match request_ref.state.compare_exchange(
            WAITING,
            CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                // # Safety:
                // After CANCELLED no other Thread touches the cell anymore
                let value = unsafe { (*request_ref.value.get()).take() }
                    .expect("a cancelled Push descriptor still carries its Value");
                self.retire_request(published, guard);
                Err(value)
            }
            Err(_) => {
                // A Pop claimed the descriptor in the meantime, wait for it
                // to finish moving the Value out
                while request_ref.state.load(Ordering::Acquire) != MATCHED {
                    core::hint::spin_loop();
                }
                self.retire_request(published, guard);
                Ok(())
            }
        }
    }

    /// Attempts to consume the Value of a Push descriptor waiting in the slot
    fn try_claim_push(&self, guard: &Guard) -> Option<T> {
        let slot = self.slot.load(Ordering::Acquire, guard);
        let partner = unsafe { slot.as_ref() }?;

        if partner.kind != Kind::Push {
            return None;
        }
        partner
            .state
            .compare_exchange(WAITING, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;

        // # Safety:
        // The CLAIMED transition made us the only Thread with access to the
        // cell until we publish MATCHED
        let value = unsafe { (*partner.value.get()).take() };
        partner.state.store(MATCHED, Ordering::Release);

        let _ = self.slot.compare_exchange(
            slot,
            Shared::null(),
            Ordering::AcqRel,
            Ordering::Relaxed,
            guard,
        );

        Some(value.expect("a waiting Push descriptor always carries its Value"))
    }

    /// Publishes a Pop descriptor and waits a bounded amount of spins for a
    /// Push to hand its Value over
    fn wait_for_push(&self, guard: &Guard) -> Option<T> {
        let request = Owned::new(Request::new(Kind::Pop, None));
        let published = match self.slot.compare_exchange(
            Shared::null(),
            request,
            Ordering::AcqRel,
            Ordering::Relaxed,
            guard,
        ) {
            Ok(shared) => shared,
            // Slot is taken by someone else, report empty to the caller
            Err(_) => return None,
        };

        let request_ref = unsafe { published.deref() };
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            if request_ref.state.load(Ordering::Acquire) == MATCHED {
                let value = self.take_matched_value(request_ref);
                self.retire_request(published, guard);
                return Some(value);
            }
            backoff.spin();
        }

        match request_ref.state.compare_exchange(
            WAITING,
            CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.retire_request(published, guard);
                None
            }
            Err(_) => {
                // A Push claimed the descriptor in the meantime
                while request_ref.state.load(Ordering::Acquire) != MATCHED {
                    core::hint::spin_loop();
                }
                let value = self.take_matched_value(request_ref);
                self.retire_request(published, guard);
                Some(value)
            }
        }
    }

    fn take_matched_value(&self, request: &Request<T>) -> T {
        // # Safety:
        // MATCHED is only published after the partner finished writing the
        // cell and never touches it again afterwards
        unsafe { (*request.value.get()).take() }
            .expect("a matched Pop descriptor carries the exchanged Value")
    }

    /// Unlinks the descriptor from the slot (unless the partner already did)
    /// and hands it to the epoch collector
    fn retire_request(&self, request: Shared<'_, Request<T>>, guard: &Guard) {
        let _ = self.slot.compare_exchange(
            request,
            Shared::null(),
            Ordering::AcqRel,
            Ordering::Relaxed,
            guard,
        );
        // # Safety:
        // Only the owning Thread retires its descriptor and it is unlinked
        // from the slot at this point, other Threads may only still hold
        // epoch-protected references
        unsafe { guard.defer_destroy(request) };
    }
}

impl<T, S: Lifo<T>> Lifo<T> for ElimStack<T, S> {
    fn push(&self, value: T) {
        ElimStack::push(self, value)
    }
    fn pop(&self) -> Option<T> {
        ElimStack::pop(self)
    }
    fn is_empty(&self) -> bool {
        ElimStack::is_empty(self)
    }
}

impl<T> core::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Request ({:?})", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::sgl::SglStack;
    use std::thread;

    #[test]
    fn push_pop() {
        let stack: ElimStack<_> = ElimStack::default();

        stack.push(13);
        assert_eq!(Some(13), stack.pop());
        assert_eq!(None, stack.pop());
    }

    #[test]
    fn lifo_order_without_contention() {
        let stack: ElimStack<_> = ElimStack::default();

        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(Some(3), stack.pop());
        assert_eq!(Some(2), stack.pop());
        assert_eq!(Some(1), stack.pop());
    }

    #[test]
    fn sgl_backing() {
        let stack: ElimStack<_, SglStack<_>> = ElimStack::default();

        stack.push(13);
        assert_eq!(Some(13), stack.pop());
    }

    #[test]
    fn concurrent_pairs() {
        let stack: ElimStack<usize> = ElimStack::default();
        let threads = 4;
        let per_thread = 1000;

        thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    for i in 0..per_thread {
                        stack.push(i);
                    }
                });
            }
            for _ in 0..threads {
                scope.spawn(|| {
                    let mut received = 0;
                    while received < per_thread {
                        if stack.pop().is_some() {
                            received += 1;
                        }
                    }
                });
            }
        });

        assert_eq!(None, stack.pop());
        assert!(stack.is_empty());
    }

    #[test]
    fn fallbacks_counted() {
        let stack: ElimStack<u8> = ElimStack::default();

        // Without a concurrent Pop the Value has to end up on the backing
        // Stack eventually
        stack.push(3);
        assert!(stack.fallbacks() >= 1);
        assert!(!stack.backing().is_empty());
        assert_eq!(Some(3), stack.pop());
    }
}
