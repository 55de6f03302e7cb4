//! Strongest-Signal-First.

use std::collections::BTreeMap;

use super::{best_candidate, Decision, DecisionContext, HandoverPolicy, Prefer, StayReason};
use crate::error::Result;
use crate::types::PolicyKind;

/// Switches to the strongest alternative once it beats the serving AP by
/// more than the hysteresis margin.
#[derive(Debug, Clone)]
pub struct StrongestSignalFirst {
    hysteresis_margin_db: f64,
}

impl StrongestSignalFirst {
    pub fn new(hysteresis_margin_db: f64) -> Self {
        Self {
            hysteresis_margin_db,
        }
    }
}

impl Default for StrongestSignalFirst {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl HandoverPolicy for StrongestSignalFirst {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Ssf
    }

    fn description(&self) -> String {
        format!("SSF: strongest RSSI, {:.1} dB hysteresis", self.hysteresis_margin_db)
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        let mut params = BTreeMap::new();
        params.insert("hysteresis_margin_db".to_string(), self.hysteresis_margin_db);
        params
    }

    fn select(&self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let current = ctx.serving.map(|m| m.rssi_dbm);

        let alternatives = ctx.alternatives().map(|m| (m, m.rssi_dbm));
        let Some((best, best_rssi)) = best_candidate(alternatives, Prefer::Highest) else {
            return Ok(Decision::Stay {
                reason: StayReason::CurrentIsBest,
            });
        };

        // Strict: an equal-or-smaller advantage never triggers a switch.
        if best_rssi > current.unwrap_or(f64::NEG_INFINITY) + self.hysteresis_margin_db {
            tracing::trace!(
                station = %ctx.snapshot.station_id,
                candidate = %best.ap_id,
                rssi = best_rssi,
                "SSF margin cleared"
            );
            return Ok(Decision::Switch {
                target: best.ap_id.clone(),
                trigger_value: best_rssi,
                current_value: current,
            });
        }

        let reason = if current.is_some_and(|c| c + super::TIE_TOLERANCE >= best_rssi) {
            StayReason::CurrentIsBest
        } else {
            StayReason::BelowMargin
        };
        Ok(Decision::Stay { reason })
    }
}
