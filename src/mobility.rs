//! Mobility driver.
//!
//! Each station follows a predefined path, one position per tick. A run lasts
//! as long as the longest path; stations with shorter paths stay at their
//! last position.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::StationConfig;
use crate::types::{Position, StationId};

/// Ordered positions a station visits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    positions: Vec<Position>,
}

impl Path {
    pub fn new(positions: Vec<Position>) -> Self {
        Self { positions }
    }

    /// Straight walk from `from` to `to`, inclusive at both ends, with
    /// `step_m` meters between consecutive positions.
    pub fn linear(from: Position, to: Position, step_m: f64) -> Self {
        let length = from.distance_to(&to);
        if length == 0.0 || step_m <= 0.0 {
            return Self::new(vec![from]);
        }
        let steps = (length / step_m + 1e-9).floor() as usize;
        let (dx, dy) = ((to.x - from.x) / length, (to.y - from.y) / length);
        let mut positions: Vec<Position> = (0..=steps)
            .map(|i| {
                let travelled = i as f64 * step_m;
                Position::new(from.x + dx * travelled, from.y + dy * travelled)
            })
            .collect();
        if positions.last().map_or(true, |last| last.distance_to(&to) > 1e-9) {
            positions.push(to);
        }
        Self::new(positions)
    }

    /// A station that never moves.
    pub fn stationary(at: Position) -> Self {
        Self::new(vec![at])
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Position at `tick`, holding the last position once the path ends.
    pub fn position_at(&self, tick: usize) -> Option<Position> {
        self.positions
            .get(tick)
            .or_else(|| self.positions.last())
            .copied()
    }
}

impl From<Path> for Vec<Position> {
    fn from(path: Path) -> Self {
        path.positions
    }
}

/// Advances every station along its path.
#[derive(Debug, Clone, Default)]
pub struct MobilityDriver {
    paths: BTreeMap<StationId, Path>,
}

impl MobilityDriver {
    pub fn new(stations: &[StationConfig]) -> Self {
        Self {
            paths: stations
                .iter()
                .map(|s| (s.id.clone(), Path::new(s.path.clone())))
                .collect(),
        }
    }

    /// Number of ticks in the run.
    pub fn tick_count(&self) -> usize {
        self.paths.values().map(Path::len).max().unwrap_or(0)
    }

    pub fn position_at(&self, station: &StationId, tick: usize) -> Option<Position> {
        self.paths.get(station).and_then(|path| path.position_at(tick))
    }

    /// Positions of every station at `tick`, in station-id order.
    pub fn positions_at(&self, tick: usize) -> impl Iterator<Item = (&StationId, Position)> + '_ {
        self.paths
            .iter()
            .filter_map(move |(id, path)| path.position_at(tick).map(|p| (id, p)))
    }
}
