//! This module provides a variety of different concurrent Queue
//! implementations that all expose the same FIFO interface
//!
//! # Michael-Scott
//! The classic lock-free Queue with separate atomic Head/Tail pointers and a
//! permanent Dummy-Node, usable with any number of Producers and Consumers.
//!
//! # Basket
//! An extension of the Michael-Scott structure that reduces Tail contention:
//! Enqueues that lose the Tail race may still link their Node into a "Basket"
//! of concurrently inserted Nodes, and Dequeues remove Nodes lazily with a
//! deletion mark before reclaiming whole chains at once.
//!
//! # SGL
//! A baseline Queue that guards a plain `VecDeque` with one global Mutex.

pub mod basket;
pub mod michael_scott;
pub mod sgl;

/// The uniform FIFO interface shared by all the Queue implementations
///
/// Every operation takes `&self`, all implementations are safe to call
/// concurrently from any number of Threads
pub trait Fifo<T> {
    /// Enqueues the Value at the Back of the Queue
    fn enqueue(&self, value: T);

    /// Attempts to dequeue the Element at the Front of the Queue
    ///
    /// # Returns
    /// * `Some(value)` with the removed front Element
    /// * `None` if the Queue was observed to be empty
    fn dequeue(&self) -> Option<T>;

    /// Checks if the Queue is currently empty
    ///
    /// Without concurrent writers this is stable across repeated calls
    fn is_empty(&self) -> bool;
}
