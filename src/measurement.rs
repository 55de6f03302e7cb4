//! Per-tick measurement snapshots.
//!
//! A snapshot is what one station observes at one tick: RSSI, range and load
//! for every access point. It is rebuilt for every station pipeline so it
//! always reflects handovers committed earlier in the same tick.

use serde::{Deserialize, Serialize};

use crate::propagation::{PropagationModel, Shadowing};
use crate::registry::ApRegistry;
use crate::types::{ApId, Position, StationId};

/// What a station observes from one access point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApMeasurement {
    pub ap_id: ApId,
    pub rssi_dbm: f64,
    pub distance_m: f64,
    pub in_range: bool,
    /// Stations currently associated with the AP.
    pub load: u32,
    /// `load * load_multiplier`.
    pub weighted_load: f64,
}

/// Immutable observation of every access point by one station at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    pub tick: usize,
    pub station_id: StationId,
    pub position: Position,
    entries: Vec<ApMeasurement>,
}

impl MeasurementSnapshot {
    /// Measure every AP in `registry` from `position`.
    pub fn capture(
        tick: usize,
        station_id: &StationId,
        position: Position,
        registry: &ApRegistry,
        propagation: &PropagationModel,
        mut shadowing: Option<&mut Shadowing>,
    ) -> Self {
        let entries = registry
            .iter()
            .map(|ap| {
                let distance_m = position.distance_to(&ap.position);
                let fading = shadowing.as_deref_mut().map_or(0.0, Shadowing::sample);
                let rssi_dbm = propagation.rssi_at(distance_m) + fading;
                ApMeasurement {
                    ap_id: ap.id.clone(),
                    rssi_dbm,
                    distance_m,
                    in_range: propagation.detectable(distance_m, ap.range_m, rssi_dbm),
                    load: ap.station_count(),
                    weighted_load: ap.weighted_load(),
                }
            })
            .collect();

        Self {
            tick,
            station_id: station_id.clone(),
            position,
            entries,
        }
    }

    /// Build a snapshot from explicit entries. Entries are kept in AP-id order.
    pub fn from_entries(
        tick: usize,
        station_id: StationId,
        position: Position,
        mut entries: Vec<ApMeasurement>,
    ) -> Self {
        entries.sort_by(|a, b| a.ap_id.cmp(&b.ap_id));
        Self {
            tick,
            station_id,
            position,
            entries,
        }
    }

    /// Every measurement, in AP-id order.
    pub fn entries(&self) -> &[ApMeasurement] {
        &self.entries
    }

    pub fn get(&self, ap: &ApId) -> Option<&ApMeasurement> {
        self.entries.iter().find(|m| &m.ap_id == ap)
    }

    /// In-range measurements, in AP-id order.
    pub fn in_range(&self) -> impl Iterator<Item = &ApMeasurement> {
        self.entries.iter().filter(|m| m.in_range)
    }

    pub fn any_in_range(&self) -> bool {
        self.entries.iter().any(|m| m.in_range)
    }

    pub fn is_in_range(&self, ap: &ApId) -> bool {
        self.get(ap).is_some_and(|m| m.in_range)
    }
}
