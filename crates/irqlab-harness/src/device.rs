//! Device seams — the register and interrupt-controller surface the
//! harness needs from its embedder.
//!
//! The harness never touches hardware directly.  Everything it needs is
//! behind three traits: a timer with a free-running counter and a deadline
//! comparator ([`TimerDevice`]), an interrupt controller that can enable a
//! line and acknowledge a pending interrupt ([`IntrController`]), and a
//! plain ordered tick read for timestamping ([`TickSource`]).  The
//! [`crate::sim`] module implements all three in-process; a KVM embedder
//! would implement them over guest register accessors.
//!
//! Counter and comparator values are `u64` everywhere.  The comparison
//! under test is `counter >= comparator` in unsigned arithmetic; no part
//! of the harness may reinterpret either value as signed, since that is
//! precisely the property being validated.

/// Timer control bits, matching the arch timer CTL register layout.
pub mod ctl {
    /// Timer enabled.
    pub const ENABLE: u64 = 1 << 0;
    /// Timer interrupt masked.
    pub const IMASK: u64 = 1 << 1;
    /// Timer condition met (read-only status).
    pub const ISTATUS: u64 = 1 << 2;
}

/// Acknowledge result meaning "no interrupt pending" (the controller's
/// spurious id).
pub const IAR_SPURIOUS: u32 = 1023;

/// A deadline timer: free-running counter, comparator, control register.
///
/// Writes must be ordered against later reads by [`TimerDevice::sync`]
/// (the ISB analog); the harness calls it after every register write that
/// hardware must observe before the next step.
pub trait TimerDevice {
    /// Read the free-running counter.
    fn counter(&self) -> u64;

    /// Preset the counter to an absolute value.
    ///
    /// This is the privileged, host-side operation the oracle uses to
    /// emulate an imminent wraparound without waiting for one.  Devices
    /// with a counter narrower than 64 bits keep only the bits they have;
    /// the oracle detects that by reading back.
    fn set_counter(&self, value: u64);

    /// Read the deadline comparator.
    fn comparator(&self) -> u64;

    /// Write the deadline comparator.
    fn set_comparator(&self, value: u64);

    /// Read the control register (see [`ctl`]).
    fn control(&self) -> u64;

    /// Write the control register.
    fn set_control(&self, value: u64);

    /// Ordering barrier: all preceding register writes are observed by
    /// the device before any subsequent read.
    fn sync(&self);

    /// The interrupt line this timer asserts.
    fn irq_line(&self) -> u32;
}

/// Interrupt controller services: line enable and acknowledge.
pub trait IntrController {
    /// Enable delivery of `line` to the calling context.
    fn enable_line(&self, line: u32);

    /// Acknowledge the highest-priority pending interrupt and return its
    /// id, or [`IAR_SPURIOUS`] if nothing is pending.
    fn ack(&self) -> u32;
}

/// An ordered timestamp read, in counter ticks.
///
/// The probe timestamps with this on both sides of a stage wait; the read
/// must not be reordered before the wait returns (implementations over
/// real counters use the self-synchronizing counter register or fence).
pub trait TickSource {
    /// Read the current tick value.
    fn ticks(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctl_bits_are_distinct() {
        assert_eq!(ctl::ENABLE & ctl::IMASK, 0);
        assert_eq!(ctl::ENABLE & ctl::ISTATUS, 0);
        assert_eq!(ctl::IMASK & ctl::ISTATUS, 0);
    }

    #[test]
    fn spurious_id_is_outside_the_spi_range() {
        // GIC SPIs end at 1019; 1020..=1023 are special.
        assert!(IAR_SPURIOUS > 1019);
    }
}
