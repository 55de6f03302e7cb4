//! Aggregate view of a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::RunResult;
use crate::policy::DecisionKind;
use crate::types::{ApId, PolicyKind};

/// Throughput statistics over every station-tick of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    pub mean_mbps: f64,
    pub min_mbps: f64,
    pub std_dev_mbps: f64,
}

impl ThroughputStats {
    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let std_dev_mbps = if samples.len() < 2 {
            0.0
        } else {
            Statistics::std_dev(samples.iter())
        };
        Self {
            mean_mbps: Statistics::mean(samples.iter()),
            min_mbps: Statistics::min(samples.iter()),
            std_dev_mbps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub policy: PolicyKind,
    pub ticks: usize,
    pub handovers: usize,
    /// First associations out of the disconnected state.
    pub associations: usize,
    pub disconnections: usize,
    /// Station-ticks spent without a serving AP.
    pub disconnected_ticks: usize,
    pub throughput: ThroughputStats,
    /// Station-ticks spent on each AP.
    pub dwell_ticks: BTreeMap<ApId, usize>,
}

impl RunSummary {
    pub fn from_result(result: &RunResult) -> Self {
        let samples: Vec<f64> = result.records.iter().map(|r| r.throughput_mbps).collect();

        let mut dwell_ticks = BTreeMap::new();
        for ap in result.records.iter().filter_map(|r| r.connected_ap_id.as_ref()) {
            *dwell_ticks.entry(ap.clone()).or_insert(0) += 1;
        }

        Self {
            policy: result.policy,
            ticks: result.ticks,
            handovers: result.handover_count(),
            associations: result.association_count(),
            disconnections: result
                .records
                .iter()
                .filter(|r| r.decision == DecisionKind::Disconnect)
                .count(),
            disconnected_ticks: result.records.iter().filter(|r| !r.is_connected()).count(),
            throughput: ThroughputStats::from_samples(&samples),
            dwell_ticks,
        }
    }
}
