//! Access point registry.
//!
//! Holds the static attributes of every access point together with its
//! association count. The count changes only through [`ApRegistry::increment_load`]
//! and [`ApRegistry::decrement_load`], which the engine calls while committing a
//! confirmed handover. Strategies only ever read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AccessPointConfig;
use crate::error::{Error, InvariantViolation, Result};
use crate::types::{ApId, Position};

/// An access point and its current association count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub id: ApId,
    pub position: Position,
    pub range_m: f64,
    pub load_multiplier: f64,
    station_count: u32,
}

impl AccessPoint {
    pub fn new(config: &AccessPointConfig) -> Self {
        Self {
            id: config.id.clone(),
            position: config.position,
            range_m: config.range_m,
            load_multiplier: config.load_multiplier,
            station_count: 0,
        }
    }

    /// Number of stations currently associated.
    pub fn station_count(&self) -> u32 {
        self.station_count
    }

    /// Capacity-weighted load: `count * multiplier`.
    pub fn weighted_load(&self) -> f64 {
        f64::from(self.station_count) * self.load_multiplier
    }

    /// Load a station would experience on this AP. A station already
    /// associated is part of the count; any other station would add one.
    pub fn attached_load(&self, already_attached: bool) -> f64 {
        let count = if already_attached {
            self.station_count
        } else {
            self.station_count + 1
        };
        f64::from(count) * self.load_multiplier
    }
}

/// Shared access point state for one run.
#[derive(Debug, Clone, Default)]
pub struct ApRegistry {
    aps: BTreeMap<ApId, AccessPoint>,
}

impl ApRegistry {
    pub fn new(configs: &[AccessPointConfig]) -> Self {
        Self {
            aps: configs
                .iter()
                .map(|config| (config.id.clone(), AccessPoint::new(config)))
                .collect(),
        }
    }

    /// Look up an access point.
    pub fn get(&self, id: &ApId) -> Result<&AccessPoint> {
        self.aps.get(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &ApId) -> bool {
        self.aps.contains_key(id)
    }

    /// Access points in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &AccessPoint> {
        self.aps.values()
    }

    pub fn len(&self) -> usize {
        self.aps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aps.is_empty()
    }

    /// Association count per access point.
    pub fn loads(&self) -> BTreeMap<ApId, u32> {
        self.aps
            .values()
            .map(|ap| (ap.id.clone(), ap.station_count))
            .collect()
    }

    /// Record one more associated station.
    pub fn increment_load(&mut self, id: &ApId) -> Result<u32> {
        let ap = self.get_mut(id)?;
        ap.station_count += 1;
        Ok(ap.station_count)
    }

    /// Record one fewer associated station.
    pub fn decrement_load(&mut self, id: &ApId) -> Result<u32> {
        let ap = self.get_mut(id)?;
        ap.station_count = ap
            .station_count
            .checked_sub(1)
            .ok_or_else(|| InvariantViolation::NegativeLoad { ap: id.clone() })?;
        Ok(ap.station_count)
    }

    /// Check `count == number of stations associated` for every AP.
    pub fn verify_consistency<'a, I>(&self, associations: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ApId>,
    {
        let mut observed: BTreeMap<&ApId, u32> = BTreeMap::new();
        for ap in associations {
            if !self.aps.contains_key(ap) {
                return Err(InvariantViolation::UnknownAccessPoint(ap.clone()).into());
            }
            *observed.entry(ap).or_default() += 1;
        }

        for ap in self.aps.values() {
            let seen = observed.get(&ap.id).copied().unwrap_or(0);
            if seen != ap.station_count {
                return Err(InvariantViolation::LoadMismatch {
                    ap: ap.id.clone(),
                    recorded: ap.station_count,
                    observed: seen,
                }
                .into());
            }
        }
        Ok(())
    }

    fn get_mut(&mut self, id: &ApId) -> Result<&mut AccessPoint> {
        self.aps.get_mut(id).ok_or_else(|| Error::NotFound(id.clone()))
    }
}
