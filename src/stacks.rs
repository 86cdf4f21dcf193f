//! This module provides a variety of different concurrent Stack
//! implementations that all expose the same LIFO interface
//!
//! # Treiber
//! The classic lock-free Stack by R. K. Treiber: a single atomic top pointer
//! that every Push/Pop contends on with a CAS retry loop.
//!
//! # Elimination
//! A contention-reduction layer that can be wrapped around any of the other
//! Stacks. Concurrent Push/Pop pairs may "cancel" each other out against a
//! collision slot without ever touching the backing Stack.
//!
//! # SGL
//! A baseline Stack that guards a plain `Vec` with one global Mutex. This is
//! the throughput floor the lock-free variants are measured against.

pub mod elimination;
pub mod sgl;
pub mod treiber;

/// The uniform LIFO interface shared by all the Stack implementations
///
/// Every operation takes `&self`, all implementations are safe to call
/// concurrently from any number of Threads
pub trait Lifo<T> {
    /// Pushes the Value on top of the Stack
    fn push(&self, value: T);

    /// Attempts to pop the top Element of the Stack
    ///
    /// # Returns
    /// * `Some(value)` with the removed top Element
    /// * `None` if the Stack was observed to be empty
    fn pop(&self) -> Option<T>;

    /// Checks if the Stack is currently empty
    ///
    /// Without concurrent writers this is stable across repeated calls
    fn is_empty(&self) -> bool;
}
