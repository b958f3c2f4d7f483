//! Lock-free coordination and measurement core for the irqlab harness.
//!
//! This crate holds the two pieces shared by every execution context in a
//! latency run: the **stage barrier** that lets contexts rendezvous without
//! locks, and the **statistics accumulator** that each measuring context
//! feeds its latency samples into.  It is `no_std`-compatible with zero
//! dependencies so the same code can run on a host thread, inside a guest,
//! or anywhere an `AtomicU64` exists.
//!
//! # Why no locks
//!
//! The harness measures interrupt-delivery latency.  A mutex or condvar in
//! the rendezvous path would schedule the waiter out and fold its own
//! wakeup latency into the measurement.  The stage barrier replaces the
//! lock with a single coherent integer: release-ordered writes on advance,
//! acquire-ordered reads on wait, and a busy-poll with a CPU relax hint in
//! between.
//!
//! # Modules
//!
//! - [`stage`] — the shared stage cell and the wait/advance/set protocol
//! - [`stats`] — incremental mean + fixed-bucket histogram over samples

#![cfg_attr(not(feature = "std"), no_std)]

pub mod stage;
pub mod stats;

pub use stage::{Stage, StageCell, WaitOutcome};
pub use stats::{LatencyStats, StatsSnapshot, BIN_COUNT};
