//! Run reports — serializable summaries of oracle verdicts and probe
//! statistics, plus a plain-text rendering for the terminal.

use crate::oracle::Verdict;
use irqlab_protocol::StatsSnapshot;
use serde::Serialize;
use std::fmt::Write as _;

/// One populated histogram bucket.
#[derive(Debug, Clone, Serialize)]
pub struct BinEntry {
    /// Bucket index.
    pub index: usize,
    /// Inclusive lower bound of the bucket, in ticks.  The last bucket
    /// is open-ended (it also holds the clamped outliers).
    pub lower_bound: u64,
    /// Samples in this bucket.
    pub count: u64,
}

/// Latency distribution of one measuring role.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Samples recorded.
    pub count: u64,
    /// Integer mean latency, in ticks.
    pub mean: u64,
    /// Bucket width, in ticks.
    pub bin_size: u64,
    /// Non-empty buckets only.
    pub bins: Vec<BinEntry>,
}

impl From<&StatsSnapshot> for StatsReport {
    fn from(snap: &StatsSnapshot) -> Self {
        let bins = snap
            .bins
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(index, &count)| BinEntry {
                index,
                lower_bound: index as u64 * snap.bin_size,
                count,
            })
            .collect();
        StatsReport {
            count: snap.count,
            mean: snap.mean,
            bin_size: snap.bin_size,
            bins,
        }
    }
}

/// Outcome of one oracle scenario, flattened for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// `"passed"`, `"skipped"`, or `"failed"`.
    pub outcome: &'static str,
    /// Failure description or skip reason, when not passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ScenarioReport {
    /// Flatten a verdict.
    pub fn new(name: &str, verdict: &Verdict) -> Self {
        let (outcome, detail) = match verdict {
            Verdict::Passed => ("passed", None),
            Verdict::Skipped(reason) => ("skipped", Some(reason.clone())),
            Verdict::Failed(err) => ("failed", Some(err.to_string())),
        };
        ScenarioReport {
            name: name.to_string(),
            outcome,
            detail,
        }
    }
}

/// Complete report of a harness invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Oracle scenario outcomes, in execution order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<ScenarioReport>,
    /// Sender-side latency distribution, when the probe ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<StatsReport>,
    /// Receiver-side latency distribution, when the probe ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<StatsReport>,
}

impl RunReport {
    /// Whether any scenario failed.  Skips do not fail the run.
    pub fn failed(&self) -> bool {
        self.scenarios.iter().any(|s| s.outcome == "failed")
    }

    /// Plain-text rendering for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for scenario in &self.scenarios {
            let _ = write!(out, "{:<24} {}", scenario.name, scenario.outcome.to_uppercase());
            if let Some(detail) = &scenario.detail {
                let _ = write!(out, "  ({detail})");
            }
            out.push('\n');
        }

        if let Some(stats) = &self.sender {
            render_stats(&mut out, "sender (reinjector)", stats);
        }
        if let Some(stats) = &self.receiver {
            render_stats(&mut out, "receiver", stats);
        }

        out
    }
}

fn render_stats(out: &mut String, label: &str, stats: &StatsReport) {
    let _ = writeln!(
        out,
        "{label}: {} samples, mean {} ticks (bin width {})",
        stats.count, stats.mean, stats.bin_size
    );
    for bin in &stats.bins {
        let _ = writeln!(out, "  [{:>12} ..] {:>8}", bin.lower_bound, bin.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use irqlab_protocol::LatencyStats;

    #[test]
    fn stats_report_keeps_only_populated_bins() {
        let mut stats = LatencyStats::new(10);
        stats.record(5);
        stats.record(25);
        stats.record(25);

        let report = StatsReport::from(&stats.snapshot());
        assert_eq!(report.count, 3);
        assert_eq!(report.bins.len(), 2);
        assert_eq!(report.bins[0].index, 0);
        assert_eq!(report.bins[0].count, 1);
        assert_eq!(report.bins[1].index, 2);
        assert_eq!(report.bins[1].lower_bound, 20);
        assert_eq!(report.bins[1].count, 2);
    }

    #[test]
    fn skip_is_not_a_failure() {
        let mut report = RunReport::default();
        report.scenarios.push(ScenarioReport::new(
            "immediate_fire",
            &Verdict::Skipped("requires a 64 bit counter".into()),
        ));
        report
            .scenarios
            .push(ScenarioReport::new("no_premature_fire", &Verdict::Passed));
        assert!(!report.failed());
    }

    #[test]
    fn failure_detail_reaches_the_report() {
        let verdict = Verdict::Failed(OracleError::WrongLine {
            observed: 30,
            expected: 27,
        });
        let scenario = ScenarioReport::new("immediate_fire", &verdict);
        assert_eq!(scenario.outcome, "failed");
        assert!(scenario.detail.as_deref().unwrap().contains("30"));

        let report = RunReport {
            scenarios: vec![scenario],
            ..RunReport::default()
        };
        assert!(report.failed());
        assert!(report.render().contains("FAILED"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut stats = LatencyStats::new(1000);
        stats.record(1500);
        let report = RunReport {
            scenarios: vec![ScenarioReport::new("no_premature_fire", &Verdict::Passed)],
            sender: Some(StatsReport::from(&stats.snapshot())),
            receiver: None,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scenarios"][0]["outcome"], "passed");
        assert_eq!(json["sender"]["count"], 1);
        assert!(json.get("receiver").is_none());
    }
}
