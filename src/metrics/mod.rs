//! Run metrics.
//!
//! The collector keeps two append-only logs: one [`TickRecord`] per station
//! per tick, and one [`HandoverEvent`] per association change. Both are
//! handed out as a [`RunResult`] once the run is over.

mod summary;

pub use summary::{RunSummary, ThroughputStats};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::measurement::MeasurementSnapshot;
use crate::policy::{Decision, DecisionKind};
use crate::types::{ApId, PolicyKind, Position, StationId};

/// Throughput at the reference RSSI.
pub const THROUGHPUT_BASE_MBPS: f64 = 20.0;
/// Throughput gained per dB above the reference RSSI.
pub const THROUGHPUT_MBPS_PER_DB: f64 = 2.0;
pub const THROUGHPUT_REFERENCE_DBM: f64 = -90.0;
/// Fraction of throughput kept on a tick where the station switched.
pub const HANDOVER_THROUGHPUT_FACTOR: f64 = 0.3;

/// Rough link throughput for a station served at `rssi_dbm`.
///
/// `None` means disconnected and yields zero.
pub fn estimate_throughput(rssi_dbm: Option<f64>, switched: bool) -> f64 {
    let Some(rssi) = rssi_dbm else {
        return 0.0;
    };
    let base = (THROUGHPUT_BASE_MBPS + THROUGHPUT_MBPS_PER_DB * (rssi - THROUGHPUT_REFERENCE_DBM))
        .max(0.0);
    if switched {
        base * HANDOVER_THROUGHPUT_FACTOR
    } else {
        base
    }
}

// ============================================================================
// Records
// ============================================================================

/// One AP as seen in a tick record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub ap_id: ApId,
    pub rssi_dbm: f64,
    pub in_range: bool,
    pub load: u32,
}

/// What happened to one station at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: usize,
    pub station_id: StationId,
    pub position: Position,
    pub measurements: Vec<MeasurementRecord>,
    /// Serving AP after the decision was applied.
    pub connected_ap_id: Option<ApId>,
    pub decision: DecisionKind,
    /// Target of a switch decision.
    pub chosen_ap_id: Option<ApId>,
    pub throughput_mbps: f64,
}

impl TickRecord {
    pub fn is_connected(&self) -> bool {
        self.connected_ap_id.is_some()
    }
}

/// A committed association change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverEvent {
    pub tick: usize,
    pub station_id: StationId,
    pub policy: PolicyKind,
    /// `None` for a first association out of the disconnected state.
    pub from_ap_id: Option<ApId>,
    pub to_ap_id: ApId,
    /// Criterion value that triggered the change (RSSI, load or score).
    pub trigger_metric_value: f64,
}

impl HandoverEvent {
    /// True for an AP-to-AP switch, false for a first association.
    pub fn is_handover(&self) -> bool {
        self.from_ap_id.is_some()
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Append-only log for one run.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    policy: PolicyKind,
    records: Vec<TickRecord>,
    events: Vec<HandoverEvent>,
}

impl MetricsCollector {
    pub fn new(policy: PolicyKind) -> Self {
        Self {
            policy,
            records: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Record the outcome of one station pipeline.
    pub fn record_tick(
        &mut self,
        snapshot: &MeasurementSnapshot,
        connected_ap_id: Option<ApId>,
        decision: &Decision,
        switched: bool,
    ) {
        let serving_rssi = connected_ap_id
            .as_ref()
            .and_then(|ap| snapshot.get(ap))
            .map(|m| m.rssi_dbm);

        self.records.push(TickRecord {
            tick: snapshot.tick,
            station_id: snapshot.station_id.clone(),
            position: snapshot.position,
            measurements: snapshot
                .entries()
                .iter()
                .map(|m| MeasurementRecord {
                    ap_id: m.ap_id.clone(),
                    rssi_dbm: m.rssi_dbm,
                    in_range: m.in_range,
                    load: m.load,
                })
                .collect(),
            connected_ap_id,
            decision: decision.kind(),
            chosen_ap_id: decision.target().cloned(),
            throughput_mbps: estimate_throughput(serving_rssi, switched),
        });
    }

    pub fn record_event(&mut self, event: HandoverEvent) {
        self.events.push(event);
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn events(&self) -> &[HandoverEvent] {
        &self.events
    }

    pub fn finish(
        self,
        scenario: String,
        ticks: usize,
        parameters: BTreeMap<String, f64>,
    ) -> RunResult {
        RunResult {
            scenario,
            policy: self.policy,
            parameters,
            ticks,
            records: self.records,
            events: self.events,
        }
    }
}

// ============================================================================
// Run Result
// ============================================================================

/// Complete log of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub scenario: String,
    pub policy: PolicyKind,
    pub parameters: BTreeMap<String, f64>,
    pub ticks: usize,
    /// Per-station, per-tick trace in processing order.
    pub records: Vec<TickRecord>,
    pub events: Vec<HandoverEvent>,
}

impl RunResult {
    /// AP-to-AP switches (first associations excluded).
    pub fn handover_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_handover()).count()
    }

    /// First associations out of the disconnected state.
    pub fn association_count(&self) -> usize {
        self.events.len() - self.handover_count()
    }

    pub fn events_for<'a>(&'a self, station: &'a StationId) -> impl Iterator<Item = &'a HandoverEvent> {
        self.events.iter().filter(move |e| &e.station_id == station)
    }

    pub fn records_for<'a>(&'a self, station: &'a StationId) -> impl Iterator<Item = &'a TickRecord> {
        self.records.iter().filter(move |r| &r.station_id == station)
    }

    /// Serving AP of `station` after tick `tick`.
    pub fn connected_at(&self, station: &StationId, tick: usize) -> Option<&ApId> {
        self.records
            .iter()
            .find(|r| r.tick == tick && &r.station_id == station)
            .and_then(|r| r.connected_ap_id.as_ref())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_result(self)
    }

    /// Export records and events as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::ApMeasurement;
    use crate::policy::StayReason;

    fn snapshot(tick: usize) -> MeasurementSnapshot {
        MeasurementSnapshot::from_entries(
            tick,
            StationId::new("sta1"),
            Position::new(10.0, 0.0),
            vec![
                ApMeasurement {
                    ap_id: ApId::new("ap2"),
                    rssi_dbm: -80.0,
                    distance_m: 40.0,
                    in_range: true,
                    load: 0,
                    weighted_load: 0.0,
                },
                ApMeasurement {
                    ap_id: ApId::new("ap1"),
                    rssi_dbm: -60.0,
                    distance_m: 10.0,
                    in_range: true,
                    load: 1,
                    weighted_load: 1.0,
                },
            ],
        )
    }

    fn event(tick: usize, from: Option<&str>, to: &str) -> HandoverEvent {
        HandoverEvent {
            tick,
            station_id: StationId::new("sta1"),
            policy: PolicyKind::Ssf,
            from_ap_id: from.map(ApId::new),
            to_ap_id: ApId::new(to),
            trigger_metric_value: -60.0,
        }
    }

    #[test]
    fn test_throughput_estimate() {
        assert_eq!(estimate_throughput(None, false), 0.0);
        assert!((estimate_throughput(Some(-60.0), false) - 80.0).abs() < 1e-12);
        assert!((estimate_throughput(Some(-60.0), true) - 24.0).abs() < 1e-12);
        assert!((estimate_throughput(Some(-90.0), false) - 20.0).abs() < 1e-12);
        assert_eq!(estimate_throughput(Some(-105.0), false), 0.0);
    }

    #[test]
    fn test_record_tick_uses_serving_rssi() {
        let mut collector = MetricsCollector::new(PolicyKind::Ssf);
        let stay = Decision::Stay {
            reason: StayReason::CurrentIsBest,
        };
        collector.record_tick(&snapshot(0), Some(ApId::new("ap1")), &stay, false);
        collector.record_tick(&snapshot(1), None, &Decision::Disconnect, false);

        let records = collector.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].measurements[0].ap_id.as_str(), "ap1");
        assert!((records[0].throughput_mbps - 80.0).abs() < 1e-12);
        assert_eq!(records[0].decision, DecisionKind::Stay);
        assert_eq!(records[1].throughput_mbps, 0.0);
        assert!(!records[1].is_connected());
    }

    #[test]
    fn test_handover_count_excludes_first_association() {
        let mut collector = MetricsCollector::new(PolicyKind::Ssf);
        collector.record_event(event(0, None, "ap1"));
        collector.record_event(event(5, Some("ap1"), "ap2"));
        collector.record_event(event(9, None, "ap2"));
        let result = collector.finish("test".into(), 10, BTreeMap::new());
        assert_eq!(result.events.len(), 3);
        assert_eq!(result.handover_count(), 1);
        assert_eq!(result.association_count(), 2);
        assert_eq!(result.events_for(&StationId::new("sta1")).count(), 3);
        assert_eq!(result.events_for(&StationId::new("sta2")).count(), 0);
    }

    #[test]
    fn test_json_export() {
        let mut collector = MetricsCollector::new(PolicyKind::Mcdm);
        let switch = Decision::Switch {
            target: ApId::new("ap1"),
            trigger_value: 0.8,
            current_value: None,
        };
        collector.record_tick(&snapshot(0), Some(ApId::new("ap1")), &switch, true);
        collector.record_event(event(0, None, "ap1"));
        let result = collector.finish("json".into(), 1, BTreeMap::new());

        let json = result.to_json().unwrap();
        assert!(json.contains("\"decision\":\"switch\""));
        assert!(json.contains("\"from_ap_id\":null"));
        assert!(json.contains("\"policy\":\"MCDM\""));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["records"][0]["chosen_ap_id"], "ap1");
        let parsed = RunResult::from_json(&json).unwrap();
        assert_eq!(parsed.events, result.events);
        assert_eq!(parsed.records.len(), 1);
    }
}
