//! Stage barrier — lock-free rendezvous over a single shared integer.
//!
//! All participating execution contexts (vCPUs, threads) share one
//! [`StageCell`].  A context blocks by spinning in [`StageCell::wait_for`]
//! until the cell holds the stage it is waiting for; the context that owns
//! the current phase moves the protocol forward with
//! [`StageCell::advance`] (current + 1) or [`StageCell::set`] (explicit
//! jump, e.g. recycling to [`Stage::PrepareSend`] or terminating with
//! [`Stage::Done`]).
//!
//! # Ordering guarantee
//!
//! `set`/`advance` publish with release ordering and `wait_for` observes
//! with acquire ordering, so every memory write a context performs before
//! advancing is visible to any context after its matching `wait_for`
//! returns.  That pairing is the entire synchronization story: no other
//! shared state needs a lock.
//!
//! # Preconditions (documented, not enforced)
//!
//! At most one context advances the stage during any given phase.  The
//! cell provides atomic store/fetch-add, not compare-and-swap arbitration;
//! two contexts calling `set` concurrently is a harness bug and the
//! resulting stage sequence is undefined.  (Two contexts each calling
//! `advance` once in the same phase is the one sanctioned exception: the
//! reinjection cycle uses a pair of increments to count both measuring
//! contexts in, and fetch-add makes the pair loss-free.)
//!
//! # Termination
//!
//! [`Stage::Done`] is the sole cancellation signal.  A waiter that
//! observes `Done` while waiting for anything else gets
//! [`WaitOutcome::Finished`] and must exit its test loop cleanly; the run
//! is complete, not failed.  Cancellation is cooperative — a context in a
//! bounded delay only notices `Done` at its next `wait_for`.

use core::sync::atomic::{AtomicU64, Ordering};

/// Checkpoints of the reinjection cycle, plus the terminal sentinel.
///
/// The numeric values are part of the protocol: `advance` moves the cell
/// to `current + 1`, so the cycle stages must be consecutive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Stage {
    /// Initial value; nothing has happened yet.
    Start = 0,
    /// Driver has opened a measurement cycle; measuring contexts take
    /// their start timestamps on observing this.
    PrepareSend = 1,
    /// First measuring context has checked in.
    ReadySend1 = 2,
    /// Second measuring context has checked in; the interrupt may now be
    /// injected.
    ReadySend2 = 3,
    /// The interrupt has been requested.
    Sent = 4,
    /// The interrupt reached the intermediate hop (the reinjecting
    /// context); end point of the sender-side measurement.
    SentIntermediate = 5,
    /// The interrupt arrived at the target context; end point of the
    /// receiver-side measurement.
    Received = 6,
    /// Terminal sentinel.  May be observed from any prior stage and
    /// short-circuits all waiters.
    Done = 7,
}

impl Stage {
    /// Decode a raw cell value back into a stage.
    ///
    /// Returns `None` for values outside the enumeration (possible only
    /// under a protocol violation, e.g. an `advance` past `Received`).
    pub const fn from_raw(raw: u64) -> Option<Stage> {
        match raw {
            0 => Some(Stage::Start),
            1 => Some(Stage::PrepareSend),
            2 => Some(Stage::ReadySend1),
            3 => Some(Stage::ReadySend2),
            4 => Some(Stage::Sent),
            5 => Some(Stage::SentIntermediate),
            6 => Some(Stage::Received),
            7 => Some(Stage::Done),
            _ => None,
        }
    }

    /// The raw cell value for this stage.
    pub const fn raw(self) -> u64 {
        self as u64
    }
}

/// Result of a [`StageCell::wait_for`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The awaited stage was observed; the phase may proceed.
    Reached,
    /// [`Stage::Done`] was observed instead.  The caller must exit its
    /// loop and treat the run as complete.
    Finished,
}

/// The shared stage cell: one atomic integer, shared by reference or
/// handle with every participating context for the lifetime of the run.
#[derive(Debug)]
pub struct StageCell(AtomicU64);

impl StageCell {
    /// Create a cell at [`Stage::Start`].
    pub const fn new() -> Self {
        StageCell(AtomicU64::new(Stage::Start as u64))
    }

    /// Acquire-ordered read of the raw stage value.
    ///
    /// Reads that follow this load happen-after the writes that preceded
    /// the matching release store.
    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Release-ordered store of an explicit stage.
    ///
    /// Used for non-sequential jumps: recycling the cycle back to
    /// [`Stage::PrepareSend`], or jumping to [`Stage::Done`] from
    /// anywhere.
    pub fn set(&self, stage: Stage) {
        self.0.store(stage as u64, Ordering::Release);
    }

    /// Atomically advance the stage by exactly 1 (acq-rel).
    ///
    /// Used when the protocol's next stage is always `current + 1`.
    pub fn advance(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Busy-poll until the cell holds `target`, or [`Stage::Done`].
    ///
    /// The loop spins with [`core::hint::spin_loop`] so sibling hardware
    /// threads are not starved.  There is no timeout at this layer; a
    /// global run timeout is the controller's concern.
    pub fn wait_for(&self, target: Stage) -> WaitOutcome {
        loop {
            let cur = self.load();
            if cur == target as u64 {
                return WaitOutcome::Reached;
            }
            if cur == Stage::Done as u64 {
                return WaitOutcome::Finished;
            }
            core::hint::spin_loop();
        }
    }
}

impl Default for StageCell {
    fn default() -> Self {
        Self::new()
    }
}
