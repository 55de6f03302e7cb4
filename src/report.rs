//! Policy Comparison
//!
//! Runs one scenario under several policies, each on a fresh registry, and
//! lines the traces up tick by tick.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ScenarioConfig;
use crate::engine;
use crate::error::Result;
use crate::metrics::{RunResult, RunSummary};
use crate::types::{PolicyKind, StationId};

// ============================================================================
// Agreement
// ============================================================================

/// Where two policies left a station on the same AP and where they did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAgreement {
    pub first: PolicyKind,
    pub second: PolicyKind,
    /// Station-ticks with the same serving AP (or both disconnected).
    pub agreements: usize,
    pub disagreements: usize,
    /// `(tick, station)` of every disagreement, in trace order.
    pub divergent: Vec<(usize, StationId)>,
}

impl PolicyAgreement {
    pub fn between(first: &RunResult, second: &RunResult) -> Self {
        let mut agreements = 0;
        let mut divergent = Vec::new();

        for (a, b) in first.records.iter().zip(&second.records) {
            if a.connected_ap_id == b.connected_ap_id {
                agreements += 1;
            } else {
                divergent.push((a.tick, a.station_id.clone()));
            }
        }

        Self {
            first: first.policy,
            second: second.policy,
            agreements,
            disagreements: divergent.len(),
            divergent,
        }
    }

    /// Share of station-ticks on which both policies agree.
    pub fn agreement_ratio(&self) -> f64 {
        let total = self.agreements + self.disagreements;
        if total == 0 {
            1.0
        } else {
            self.agreements as f64 / total as f64
        }
    }

    pub fn first_divergence(&self) -> Option<&(usize, StationId)> {
        self.divergent.first()
    }
}

// ============================================================================
// Comparison
// ============================================================================

#[derive(Debug, Clone)]
pub struct Comparison {
    pub scenario: String,
    pub runs: Vec<RunResult>,
    pub agreements: Vec<PolicyAgreement>,
}

impl Comparison {
    /// Run `config` once per policy in `policies`.
    pub fn run(config: &ScenarioConfig, policies: &[PolicyKind]) -> Result<Self> {
        let runs = policies
            .iter()
            .map(|&policy| engine::run(&config.with_policy(policy)))
            .collect::<Result<Vec<_>>>()?;

        let comparison = Self::from_runs(config.name.clone(), runs);
        for agreement in &comparison.agreements {
            info!(
                scenario = %comparison.scenario,
                first = %agreement.first,
                second = %agreement.second,
                agreements = agreement.agreements,
                disagreements = agreement.disagreements,
                "policy comparison"
            );
        }
        Ok(comparison)
    }

    /// Pairwise agreement over already collected runs.
    pub fn from_runs(scenario: String, runs: Vec<RunResult>) -> Self {
        let mut agreements = Vec::new();
        for (i, first) in runs.iter().enumerate() {
            for second in &runs[i + 1..] {
                agreements.push(PolicyAgreement::between(first, second));
            }
        }
        Self {
            scenario,
            runs,
            agreements,
        }
    }

    pub fn run_for(&self, policy: PolicyKind) -> Option<&RunResult> {
        self.runs.iter().find(|r| r.policy == policy)
    }

    pub fn agreement(&self, a: PolicyKind, b: PolicyKind) -> Option<&PolicyAgreement> {
        self.agreements
            .iter()
            .find(|p| (p.first == a && p.second == b) || (p.first == b && p.second == a))
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        self.runs.iter().map(RunResult::summary).collect()
    }

    /// Render per-policy summaries and pairwise agreement as tables.
    pub fn render(&self) -> String {
        let mut summary_table = Table::new();
        summary_table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Policy",
                "Handovers",
                "Associations",
                "Disconnects",
                "Offline ticks",
                "Mean Mbps",
                "Min Mbps",
                "Std Mbps",
            ]);

        for summary in self.summaries() {
            summary_table.add_row(vec![
                summary.policy.to_string(),
                summary.handovers.to_string(),
                summary.associations.to_string(),
                summary.disconnections.to_string(),
                summary.disconnected_ticks.to_string(),
                format!("{:.1}", summary.throughput.mean_mbps),
                format!("{:.1}", summary.throughput.min_mbps),
                format!("{:.1}", summary.throughput.std_dev_mbps),
            ]);
        }

        let mut agreement_table = Table::new();
        agreement_table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Pair", "Agree", "Disagree", "Ratio", "First divergence"]);

        for agreement in &self.agreements {
            let first_divergence = agreement
                .first_divergence()
                .map_or_else(|| "-".to_string(), |(tick, station)| format!("tick {tick} ({station})"));
            agreement_table.add_row(vec![
                format!("{} / {}", agreement.first, agreement.second),
                agreement.agreements.to_string(),
                agreement.disagreements.to_string(),
                format!("{:.1}%", agreement.agreement_ratio() * 100.0),
                first_divergence,
            ]);
        }

        format!("Scenario: {}\n{summary_table}\n{agreement_table}", self.scenario)
    }
}
