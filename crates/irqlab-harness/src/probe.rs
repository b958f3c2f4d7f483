//! Reinjection latency probe — measures interrupt redirection end to end.
//!
//! Three parties cooperate over one [`StageCell`]:
//!
//! - the **driver** opens each measurement cycle, triggers the injection,
//!   and recycles the stage until its stop policy is met;
//! - the **sender** (the context whose interrupt gets reinjected) measures
//!   [`Stage::PrepareSend`] → [`Stage::SentIntermediate`];
//! - the **receiver** (the redirection target) measures
//!   [`Stage::PrepareSend`] → [`Stage::Received`].
//!
//! The `Sent → SentIntermediate → Received` transitions are performed by
//! the interrupt-delivery machinery itself (in a real system, the
//! intermediate hop's handler and the target's handler; in the simulated
//! fabric, a thread standing in for both), so the measured intervals are
//! delivery time, not bookkeeping time.
//!
//! Role selection is static: each context compares its own identity
//! against the configured target identity once at start
//! ([`Role::select`]) and keeps that role for the whole run.
//!
//! Termination is cooperative.  The driver jumps the stage to
//! [`Stage::Done`] when its sample or time cap is reached; every role
//! observes that at its next wait and exits its loop cleanly with the
//! statistics it has accumulated.  A run that ends this way is complete,
//! never failed.

use crate::device::TickSource;
use irqlab_protocol::{LatencyStats, Stage, StageCell, WaitOutcome};
use log::{debug, info};
use std::time::{Duration, Instant};

/// Fixed identity of an execution context (MPIDR analog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// The two measuring roles of the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The context whose interrupt is intercepted and redirected; its
    /// latency dimension ends at [`Stage::SentIntermediate`].
    Sender,
    /// The redirection target; its latency dimension ends at
    /// [`Stage::Received`].
    Receiver,
}

impl Role {
    /// Pick this context's role by comparing its identity against the
    /// designated target.  Decided once at start, static for the run.
    pub fn select(own: ContextId, target: ContextId) -> Role {
        if own == target {
            Role::Receiver
        } else {
            Role::Sender
        }
    }
}

/// Stop policy and measurement parameters for the probe driver.
///
/// The cycle has no intrinsic stopping condition, so the bound is
/// explicit configuration: the driver stops at `samples` completed
/// cycles, or when `max_duration` has elapsed, whichever comes first.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Number of measurement cycles to drive.
    pub samples: u64,
    /// Optional wall-clock cap on the whole run.
    pub max_duration: Option<Duration>,
    /// Histogram bucket width, in ticks.  Must be non-zero.
    pub bucket_width: u64,
    /// Pause after each completed cycle before recycling, so both
    /// measuring contexts are back at the top of their loops.
    pub settle: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            samples: 100,
            max_duration: None,
            bucket_width: 1_000,
            settle: Duration::from_micros(200),
        }
    }
}

/// The injection seam: asked by the driver to request one interrupt
/// toward the intermediate hop.  The delivery machinery behind it is
/// responsible for the subsequent stage transitions.
pub trait Reinjector {
    /// Request one interrupt.  Called between [`Stage::ReadySend2`] and
    /// the driver's store of [`Stage::Sent`].
    fn inject(&self);
}

/// Shared body of both measuring roles: wait for the cycle to open, take
/// the start tick, check in, wait for this role's end stage, take the end
/// tick, record.  Tick deltas use wrapping subtraction so a counter
/// wrap mid-sample still yields the correct unsigned duration.
fn run_role<T: TickSource>(
    cell: &StageCell,
    ticks: &T,
    end_stage: Stage,
    bucket_width: u64,
) -> LatencyStats {
    let mut stats = LatencyStats::new(bucket_width);

    loop {
        if cell.wait_for(Stage::PrepareSend) == WaitOutcome::Finished {
            break;
        }
        let start = ticks.ticks();

        cell.advance();
        if cell.wait_for(end_stage) == WaitOutcome::Finished {
            break;
        }
        let end = ticks.ticks();

        stats.record(end.wrapping_sub(start));
    }

    debug!(
        "role waiting for {:?} finished with {} samples",
        end_stage,
        stats.count()
    );
    stats
}

/// Sender measuring loop.  Runs until [`Stage::Done`] is observed;
/// returns the accumulated request → intermediate-hop latencies.
pub fn run_sender<T: TickSource>(cell: &StageCell, ticks: &T, bucket_width: u64) -> LatencyStats {
    run_role(cell, ticks, Stage::SentIntermediate, bucket_width)
}

/// Receiver measuring loop.  Runs until [`Stage::Done`] is observed;
/// returns the accumulated request → delivery latencies.
pub fn run_receiver<T: TickSource>(cell: &StageCell, ticks: &T, bucket_width: u64) -> LatencyStats {
    run_role(cell, ticks, Stage::Received, bucket_width)
}

/// Run a context's measuring loop for the role its identity selects.
pub fn run_context<T: TickSource>(
    cell: &StageCell,
    ticks: &T,
    own: ContextId,
    target: ContextId,
    bucket_width: u64,
) -> LatencyStats {
    match Role::select(own, target) {
        Role::Sender => run_sender(cell, ticks, bucket_width),
        Role::Receiver => run_receiver(cell, ticks, bucket_width),
    }
}

/// Drive measurement cycles until the stop policy is met, then terminate
/// the run with [`Stage::Done`].  Returns the number of completed cycles.
///
/// Per cycle: open with [`Stage::PrepareSend`], wait for both measuring
/// contexts to check in ([`Stage::ReadySend2`]), ask the [`Reinjector`]
/// for one interrupt, publish [`Stage::Sent`], and wait for the delivery
/// machinery to carry the stage to [`Stage::Received`].  The settle pause
/// afterwards keeps the recycled `PrepareSend` from overtaking a role
/// that is still recording.
pub fn run_driver<R: Reinjector>(cell: &StageCell, reinjector: &R, config: &ProbeConfig) -> u64 {
    let started = Instant::now();
    let mut cycles = 0;

    info!(
        "probe driver: {} cycles requested, time cap {:?}",
        config.samples, config.max_duration
    );

    while cycles < config.samples {
        if let Some(cap) = config.max_duration {
            if started.elapsed() >= cap {
                info!("probe driver: time cap reached after {cycles} cycles");
                break;
            }
        }

        cell.set(Stage::PrepareSend);
        if cell.wait_for(Stage::ReadySend2) == WaitOutcome::Finished {
            break;
        }

        reinjector.inject();
        cell.set(Stage::Sent);

        if cell.wait_for(Stage::Received) == WaitOutcome::Finished {
            break;
        }
        cycles += 1;

        std::thread::sleep(config.settle);
    }

    cell.set(Stage::Done);
    info!("probe driver: done after {cycles} cycles");
    cycles
}
