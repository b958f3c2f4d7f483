//! irqlab harness — timer comparison-semantics oracle and interrupt
//! reinjection latency probe.
//!
//! Two questions about a virtualized timer/interrupt path are answered
//! here:
//!
//! 1. **Is the timer condition unsigned?**  A deadline comparator against
//!    a free-running counter must use unsigned (wraparound-safe)
//!    comparison.  The [`oracle`] module arms the timer into positions
//!    where signed and unsigned readings disagree and classifies the
//!    implementation from what fires (or doesn't).
//! 2. **How long does reinjection take?**  The [`probe`] module drives two
//!    execution contexts through a lock-free staged cycle and measures the
//!    interval from interrupt request to observed delivery, on both the
//!    reinecting and the receiving side, into per-context histograms.
//!
//! The synchronization and statistics primitives live in
//! [`irqlab_protocol`]; this crate adds the device seams ([`device`]), the
//! test procedures ([`oracle`], [`probe`]), an in-process simulated device
//! ([`sim`]) so everything can run on plain threads, and reporting
//! ([`report`]).
//!
//! VM construction, vector-table installation, and controller emulation
//! are external collaborators: embedders implement the [`device`] traits
//! against their own machinery.

pub mod device;
pub mod oracle;
pub mod probe;
pub mod report;
pub mod sim;
