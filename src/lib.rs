#![deny(missing_docs)]
#![warn(rust_2018_idioms, missing_debug_implementations)]
//! This crate provides a family of concurrent, shared-memory LIFO/FIFO
//! containers together with a small harness to benchmark them against
//! each other under configurable thread counts and workloads
//!
//! # Feature-Flags
//! * `stacks`: Enables all the Stack implementations
//! * `queues`: Enables all the Queue implementations
//! * `full`: Enables all the Feature-Flags
//!
//! # Containers
//! The lock-free variants (Treiber-Stack, Michael-Scott-Queue, Basket-Queue)
//! are built on CAS retry loops and reclaim their Nodes through
//! `crossbeam-epoch`. The Elimination layer reduces contention on a backing
//! Stack by pairing concurrent Push/Pop operations against a collision slot.
//! The single-global-lock variants exist as the blocking baseline that the
//! lock-free ones are measured against.

#[cfg(all(feature = "stacks", feature = "queues"))]
pub mod harness;
#[cfg(feature = "queues")]
pub mod queues;
#[cfg(feature = "stacks")]
pub mod stacks;
