//! In-process simulated timer and delivery fabric.
//!
//! [`SimTimer`] is a software deadline timer whose free-running counter
//! advances in nanoseconds of wall-clock time.  It implements all three
//! device seams ([`TimerDevice`], [`IntrController`], [`TickSource`]) so
//! the oracle and the probe can run on plain threads with no virtual
//! machine underneath.
//!
//! The timer's comparison mode is selectable: [`Comparison::Unsigned`] is
//! the correct behavior, [`Comparison::Signed`] reproduces the bug class
//! the oracle exists to catch (a comparator value with bit 63 set reads
//! as negative and the condition inverts).  Running the oracle against
//! both modes demonstrates detection in each direction.
//!
//! [`SimFabric`] stands in for the interrupt-delivery machinery of the
//! reinjection cycle: one thread that waits for [`Stage::Sent`], marks
//! the intermediate hop, sleeps a configurable hop delay, and marks
//! delivery.

use crate::device::{ctl, IntrController, TickSource, TimerDevice, IAR_SPURIOUS};
use crate::probe::Reinjector;
use irqlab_protocol::{Stage, StageCell, WaitOutcome};
use log::debug;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Interrupt line asserted by the simulated timer (the virtual timer PPI
/// number on the reference platform).
pub const SIM_TIMER_LINE: u32 = 27;

/// How the simulated hardware evaluates the timer condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Correct: `counter >= comparator` as unsigned values.
    Unsigned,
    /// The bug under test: both values reinterpreted as signed.
    Signed,
}

/// A software deadline timer with a wall-clock-driven counter.
///
/// Interior mutability throughout: the device is shared by reference
/// between the arming context and the polling context, like a real
/// register file.
#[derive(Debug)]
pub struct SimTimer {
    /// Wall-clock origin of the counter.
    origin: Instant,
    /// Offset added to elapsed nanoseconds; adjusted by `set_counter`.
    offset: AtomicU64,
    /// Deadline comparator register.
    comparator: AtomicU64,
    /// Control register (ENABLE and IMASK bits; ISTATUS is derived).
    control: AtomicU64,
    /// Bitset of controller-enabled interrupt lines.
    enabled_lines: AtomicU64,
    /// Counter width mask (all-ones for a full 64-bit counter).
    width_mask: u64,
    /// Comparison mode.
    comparison: Comparison,
}

impl SimTimer {
    /// A timer with a full 64-bit counter.
    pub fn new(comparison: Comparison) -> Self {
        Self::with_counter_width(comparison, 64)
    }

    /// A timer whose counter is `bits` wide (values wrap at `2^bits`).
    /// Used to exercise the harness's narrow-counter skip path.
    pub fn with_counter_width(comparison: Comparison, bits: u32) -> Self {
        let width_mask = if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        SimTimer {
            origin: Instant::now(),
            offset: AtomicU64::new(0),
            comparator: AtomicU64::new(0),
            control: AtomicU64::new(0),
            enabled_lines: AtomicU64::new(0),
            width_mask,
            comparison,
        }
    }

    /// Nanoseconds elapsed since the timer was created.
    fn raw_now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    /// Evaluate the timer condition in the configured mode.
    fn condition_met(&self) -> bool {
        let counter = self.counter();
        let comparator = self.comparator.load(Ordering::Relaxed);
        match self.comparison {
            Comparison::Unsigned => counter >= comparator,
            Comparison::Signed => (counter as i64) >= (comparator as i64),
        }
    }

    /// Whether the timer is currently asserting its line: enabled,
    /// unmasked, and condition met.  Level-triggered, as real deadline
    /// timers are: the line stays asserted while the condition holds.
    fn asserting(&self) -> bool {
        let control = self.control.load(Ordering::Relaxed);
        control & ctl::ENABLE != 0 && control & ctl::IMASK == 0 && self.condition_met()
    }
}

impl TimerDevice for SimTimer {
    fn counter(&self) -> u64 {
        self.offset
            .load(Ordering::Relaxed)
            .wrapping_add(self.raw_now())
            & self.width_mask
    }

    fn set_counter(&self, value: u64) {
        // Store the offset that makes the counter read `value` now; a
        // narrow counter silently drops the high bits.
        let offset = (value & self.width_mask).wrapping_sub(self.raw_now());
        self.offset.store(offset, Ordering::Relaxed);
        debug!("sim: counter preset to {:#x}", value & self.width_mask);
    }

    fn comparator(&self) -> u64 {
        self.comparator.load(Ordering::Relaxed)
    }

    fn set_comparator(&self, value: u64) {
        self.comparator.store(value, Ordering::Relaxed);
    }

    fn control(&self) -> u64 {
        let stored = self.control.load(Ordering::Relaxed);
        // ISTATUS is a live view of the condition, independent of the
        // mask, and only meaningful while the timer is enabled.
        if stored & ctl::ENABLE != 0 && self.condition_met() {
            stored | ctl::ISTATUS
        } else {
            stored & !ctl::ISTATUS
        }
    }

    fn set_control(&self, value: u64) {
        self.control
            .store(value & (ctl::ENABLE | ctl::IMASK), Ordering::Relaxed);
    }

    fn sync(&self) {
        fence(Ordering::SeqCst);
    }

    fn irq_line(&self) -> u32 {
        SIM_TIMER_LINE
    }
}

impl IntrController for SimTimer {
    fn enable_line(&self, line: u32) {
        debug_assert!(line < 64, "sim controller models lines 0..64");
        self.enabled_lines.fetch_or(1 << line, Ordering::Relaxed);
    }

    fn ack(&self) -> u32 {
        let enabled = self.enabled_lines.load(Ordering::Relaxed) & (1 << SIM_TIMER_LINE) != 0;
        if enabled && self.asserting() {
            SIM_TIMER_LINE
        } else {
            IAR_SPURIOUS
        }
    }
}

impl TickSource for SimTimer {
    fn ticks(&self) -> u64 {
        self.counter()
    }
}

/// Simulated interrupt-delivery machinery for the reinjection cycle.
///
/// One [`SimFabric::run`] thread performs the transitions the real
/// handlers would: on [`Stage::Sent`] it advances to
/// [`Stage::SentIntermediate`] (the reinjecting hop has seen the
/// interrupt), waits out the configured hop delay, then advances to
/// [`Stage::Received`] (delivery at the target).  Exits when it observes
/// [`Stage::Done`].
#[derive(Debug)]
pub struct SimFabric {
    /// Simulated time for the interrupt to cross from the intermediate
    /// hop to the target context.
    hop_delay: Duration,
}

impl SimFabric {
    /// A fabric with the given hop delay.
    pub fn new(hop_delay: Duration) -> Self {
        SimFabric { hop_delay }
    }

    /// Delivery loop; run on its own thread for the lifetime of a probe
    /// run.
    pub fn run(&self, cell: &StageCell) {
        loop {
            if cell.wait_for(Stage::Sent) == WaitOutcome::Finished {
                break;
            }
            cell.advance(); // intermediate hop observed the interrupt
            std::thread::sleep(self.hop_delay);
            cell.advance(); // delivered at the target
        }
        debug!("sim fabric: done");
    }
}

impl Reinjector for SimFabric {
    // The simulated interrupt is carried by the stage cell itself; the
    // delivery thread reacts to the Sent transition, so the injection
    // request has no separate side channel to poke.
    fn inject(&self) {}
}
