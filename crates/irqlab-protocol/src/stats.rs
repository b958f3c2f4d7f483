//! Online latency statistics — incremental mean and a clamped histogram.
//!
//! Each measuring context owns one [`LatencyStats`] for the lifetime of
//! the run and calls [`LatencyStats::record`] once per sample.  Nothing
//! here is synchronized: single-writer discipline is provided by the
//! stage barrier (only the context that owns the current measurement
//! phase records), so the accumulator itself stays plain data.
//!
//! The mean is maintained with the integer recurrence
//! `mean' = (mean * n + x) / (n + 1)` rather than a running sum, so the
//! stored state never exceeds the magnitude of a single sample.  The
//! multiply is widened to `u128`; for the intended test durations
//! (seconds of run time at nanosecond/tick resolution) neither factor
//! approaches 2^64, and the quotient always fits back in a `u64`.

/// Number of histogram buckets.
pub const BIN_COUNT: usize = 64;

/// Running statistics over a stream of latency samples, in counter ticks.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    /// Samples recorded so far.
    count: u64,
    /// Exact integer mean of all samples seen so far.
    mean: u64,
    /// Fixed-width histogram buckets.
    bins: [u64; BIN_COUNT],
    /// Width of each bucket, in ticks.
    bin_size: u64,
}

/// Immutable copy of the accumulated statistics, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Samples recorded.
    pub count: u64,
    /// Integer mean of all samples.
    pub mean: u64,
    /// Histogram bucket counts.
    pub bins: [u64; BIN_COUNT],
    /// Width of each bucket, in ticks.
    pub bin_size: u64,
}

impl LatencyStats {
    /// Create an empty accumulator.
    ///
    /// `bin_size` is the histogram bucket width in ticks; it must be
    /// non-zero (the bucket index divides by it).
    pub const fn new(bin_size: u64) -> Self {
        assert!(bin_size > 0, "bin_size must be non-zero");
        LatencyStats {
            count: 0,
            mean: 0,
            bins: [0; BIN_COUNT],
            bin_size,
        }
    }

    /// Record one latency sample.
    ///
    /// The bucket index is clamped to the last bin, so outliers
    /// accumulate there instead of writing out of range.
    pub fn record(&mut self, sample: u64) {
        let idx = (sample / self.bin_size).min(BIN_COUNT as u64 - 1) as usize;

        self.mean = ((self.mean as u128 * self.count as u128 + sample as u128)
            / (self.count as u128 + 1)) as u64;
        self.count += 1;
        self.bins[idx] += 1;
    }

    /// Samples recorded so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current integer mean.
    pub fn mean(&self) -> u64 {
        self.mean
    }

    /// Take an immutable copy of the current state.  Does not reset.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            count: self.count,
            mean: self.mean,
            bins: self.bins,
            bin_size: self.bin_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator() {
        let stats = LatencyStats::new(10);
        let snap = stats.snapshot();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.mean, 0);
        assert_eq!(snap.bins.iter().sum::<u64>(), 0);
    }

    // The worked example: bin_size 10, samples {5, 15, 25}.
    #[test]
    fn incremental_mean_matches_recurrence() {
        let mut stats = LatencyStats::new(10);

        stats.record(5);
        assert_eq!(stats.mean(), 5);
        stats.record(15);
        assert_eq!(stats.mean(), 10);
        stats.record(25);
        assert_eq!(stats.mean(), 15);

        let snap = stats.snapshot();
        assert_eq!(snap.count, 3);
        assert_eq!(snap.bins[0], 1);
        assert_eq!(snap.bins[1], 1);
        assert_eq!(snap.bins[2], 1);
        assert_eq!(snap.bins.iter().sum::<u64>(), 3);
    }

    #[test]
    fn mean_uses_integer_division() {
        let mut stats = LatencyStats::new(1);
        stats.record(1);
        stats.record(2);
        // (1*1 + 2) / 2 = 1 in integer arithmetic.
        assert_eq!(stats.mean(), 1);
    }

    // P4: sum of bucket counts equals the sample count, for every n.
    #[test]
    fn histogram_counts_sum_to_sample_count() {
        let mut stats = LatencyStats::new(7);
        for i in 0..1000u64 {
            stats.record(i * 3);
            assert_eq!(stats.snapshot().bins.iter().sum::<u64>(), i + 1);
        }
        assert_eq!(stats.count(), 1000);
    }

    #[test]
    fn outliers_clamp_to_last_bin() {
        let mut stats = LatencyStats::new(10);
        stats.record(u64::MAX);
        stats.record(10 * BIN_COUNT as u64); // first value past the range
        let snap = stats.snapshot();
        assert_eq!(snap.bins[BIN_COUNT - 1], 2);
        assert_eq!(snap.bins.iter().sum::<u64>(), 2);
    }

    #[test]
    fn bucket_boundaries() {
        let mut stats = LatencyStats::new(10);
        stats.record(9); // last value of bin 0
        stats.record(10); // first value of bin 1
        let snap = stats.snapshot();
        assert_eq!(snap.bins[0], 1);
        assert_eq!(snap.bins[1], 1);
    }

    #[test]
    fn large_samples_do_not_overflow_the_mean() {
        let mut stats = LatencyStats::new(1 << 32);
        let big = 1u64 << 62;
        for _ in 0..16 {
            stats.record(big);
        }
        assert_eq!(stats.mean(), big);
        assert_eq!(stats.count(), 16);
    }

    #[test]
    fn snapshot_does_not_reset() {
        let mut stats = LatencyStats::new(10);
        stats.record(42);
        let a = stats.snapshot();
        let b = stats.snapshot();
        assert_eq!(a, b);
        assert_eq!(stats.count(), 1);
    }
}
