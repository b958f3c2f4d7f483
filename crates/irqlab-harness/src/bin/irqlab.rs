//! CLI for the irqlab harness, running against the in-process simulated
//! timer and delivery fabric.
//!
//! # Usage
//!
//! ```bash
//! # Run both oracle scenarios against correct (unsigned) hardware
//! irqlab oracle
//!
//! # Show the oracle catching a signed implementation, with short windows
//! irqlab oracle --signed --window-ms 100
//!
//! # Measure reinjection latency over 500 cycles, 1 us histogram buckets
//! irqlab probe --samples 500 --bucket-width 1000
//!
//! # Machine-readable output
//! irqlab --json probe --samples 100
//! ```
//!
//! Exit status is 0 when every executed scenario passed (skips included)
//! and 1 when any scenario failed.

use clap::{Parser, Subcommand, ValueEnum};
use irqlab_harness::oracle::{check_immediate_fire, check_no_premature_fire, OracleConfig};
use irqlab_harness::probe::{run_driver, run_receiver, run_sender, ProbeConfig};
use irqlab_harness::report::{RunReport, ScenarioReport, StatsReport};
use irqlab_harness::sim::{Comparison, SimFabric, SimTimer};
use irqlab_protocol::StageCell;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "irqlab")]
#[command(about = "Timer comparison-semantics oracle and interrupt reinjection latency probe")]
#[command(version)]
struct Cli {
    /// Emit the report as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Immediate fire under wraparound (counter past the midpoint).
    A,
    /// No premature fire with the comparator just below the maximum.
    B,
    /// Both scenarios.
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the timing-correctness oracle scenarios.
    Oracle {
        /// Which scenario to run.
        #[arg(long, value_enum, default_value_t = Scenario::All)]
        scenario: Scenario,
        /// Override both wait windows, in milliseconds (defaults: 1000
        /// for the immediate-fire window, 5000 for the quiet window).
        #[arg(long)]
        window_ms: Option<u64>,
        /// Simulate hardware with the signed-comparison bug, to
        /// demonstrate detection.
        #[arg(long)]
        signed: bool,
        /// Simulated counter width in bits (exercises the skip path
        /// when below 64).
        #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..=64))]
        counter_bits: u32,
    },
    /// Measure reinjection latency over the simulated delivery fabric.
    Probe {
        /// Number of measurement cycles.
        #[arg(long, default_value_t = 100)]
        samples: u64,
        /// Histogram bucket width, in ticks (nanoseconds in the sim).
        /// The histogram divides by this, so zero is rejected here
        /// rather than panicking a measuring thread mid-run.
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        bucket_width: u64,
        /// Optional wall-clock cap on the run, in milliseconds.
        #[arg(long)]
        duration_ms: Option<u64>,
        /// Simulated delivery hop delay, in microseconds.
        #[arg(long, default_value_t = 200)]
        hop_us: u64,
    },
}

fn run_oracle(scenario: Scenario, window_ms: Option<u64>, signed: bool, counter_bits: u32) -> RunReport {
    let comparison = if signed {
        Comparison::Signed
    } else {
        Comparison::Unsigned
    };
    let timer = SimTimer::with_counter_width(comparison, counter_bits);

    let mut config = OracleConfig::default();
    if let Some(ms) = window_ms {
        config.immediate_window = Duration::from_millis(ms);
        config.quiet_window = Duration::from_millis(ms);
    }

    let mut report = RunReport::default();
    if matches!(scenario, Scenario::A | Scenario::All) {
        let verdict = check_immediate_fire(&timer, &timer, &config);
        report
            .scenarios
            .push(ScenarioReport::new("immediate_fire", &verdict));
    }
    if matches!(scenario, Scenario::B | Scenario::All) {
        let verdict = check_no_premature_fire(&timer, &timer, &config);
        report
            .scenarios
            .push(ScenarioReport::new("no_premature_fire", &verdict));
    }
    report
}

fn run_probe(samples: u64, bucket_width: u64, duration_ms: Option<u64>, hop_us: u64) -> RunReport {
    let cell = StageCell::new();
    let timer = SimTimer::new(Comparison::Unsigned);
    let fabric = SimFabric::new(Duration::from_micros(hop_us));
    let config = ProbeConfig {
        samples,
        max_duration: duration_ms.map(Duration::from_millis),
        bucket_width,
        ..ProbeConfig::default()
    };

    let (sender, receiver) = thread::scope(|s| {
        let sender = s.spawn(|| run_sender(&cell, &timer, config.bucket_width));
        let receiver = s.spawn(|| run_receiver(&cell, &timer, config.bucket_width));
        let delivery = s.spawn(|| fabric.run(&cell));
        run_driver(&cell, &fabric, &config);
        delivery.join().expect("delivery thread panicked");
        (
            sender.join().expect("sender thread panicked"),
            receiver.join().expect("receiver thread panicked"),
        )
    });

    RunReport {
        scenarios: Vec::new(),
        sender: Some(StatsReport::from(&sender.snapshot())),
        receiver: Some(StatsReport::from(&receiver.snapshot())),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Oracle {
            scenario,
            window_ms,
            signed,
            counter_bits,
        } => run_oracle(scenario, window_ms, signed, counter_bits),
        Commands::Probe {
            samples,
            bucket_width,
            duration_ms,
            hop_us,
        } => run_probe(samples, bucket_width, duration_ms, hop_us),
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("report serialization")
        );
    } else {
        print!("{}", report.render());
    }

    std::process::exit(if report.failed() { 1 } else { 0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bucket_width_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from(["irqlab", "probe", "--bucket-width", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn counter_bits_outside_1_to_64_are_rejected() {
        assert!(Cli::try_parse_from(["irqlab", "oracle", "--counter-bits", "0"]).is_err());
        assert!(Cli::try_parse_from(["irqlab", "oracle", "--counter-bits", "65"]).is_err());
    }

    #[test]
    fn in_range_flags_parse() {
        assert!(Cli::try_parse_from(["irqlab", "probe", "--bucket-width", "1"]).is_ok());
        assert!(Cli::try_parse_from(["irqlab", "oracle", "--counter-bits", "56"]).is_ok());
    }
}
