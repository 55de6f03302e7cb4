//! Least-Loaded-First.

use std::collections::BTreeMap;

use super::{best_candidate, Decision, DecisionContext, HandoverPolicy, Prefer, StayReason, TIE_TOLERANCE};
use crate::error::Result;
use crate::types::PolicyKind;

/// Moves a station to the in-range AP with the lowest capacity-weighted load
/// when the serving AP is heavier by at least `min_load_delta`.
///
/// Loads are read from the registry on every call, so a decision sees every
/// handover committed before it, including those of other stations earlier
/// in the same tick.
#[derive(Debug, Clone)]
pub struct LeastLoadedFirst {
    min_load_delta: f64,
}

impl LeastLoadedFirst {
    pub fn new(min_load_delta: f64) -> Self {
        Self { min_load_delta }
    }
}

impl Default for LeastLoadedFirst {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl HandoverPolicy for LeastLoadedFirst {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Llf
    }

    fn description(&self) -> String {
        format!("LLF: least weighted load, min gap {:.2}", self.min_load_delta)
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        let mut params = BTreeMap::new();
        params.insert("min_load_delta".to_string(), self.min_load_delta);
        params
    }

    fn select(&self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let loads = ctx
            .candidates
            .iter()
            .map(|m| ctx.attached_load(&m.ap_id).map(|load| (*m, load)))
            .collect::<Result<Vec<_>>>()?;

        let Some((best, best_load)) = best_candidate(loads.iter().copied(), Prefer::Lowest) else {
            return Ok(Decision::Stay {
                reason: StayReason::NoSignal,
            });
        };

        if ctx.is_serving(&best.ap_id) {
            return Ok(Decision::Stay {
                reason: StayReason::CurrentIsBest,
            });
        }

        let current = match ctx.serving {
            Some(m) => Some(ctx.attached_load(&m.ap_id)?),
            None => None,
        };
        let gap = current.unwrap_or(f64::INFINITY) - best_load;

        if gap >= self.min_load_delta - TIE_TOLERANCE {
            tracing::trace!(
                station = %ctx.snapshot.station_id,
                candidate = %best.ap_id,
                load = best_load,
                gap,
                "LLF load gap cleared"
            );
            return Ok(Decision::Switch {
                target: best.ap_id.clone(),
                trigger_value: best_load,
                current_value: current,
            });
        }

        Ok(Decision::Stay {
            reason: StayReason::BelowMargin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessPointConfig;
    use crate::policy::testing::{registry, snapshot};
    use crate::policy::AssociationState;
    use crate::registry::ApRegistry;
    use crate::types::ApId;

    fn load(registry: &mut ApRegistry, ap: &str, stations: u32) {
        for _ in 0..stations {
            registry.increment_load(&ApId::new(ap)).unwrap();
        }
    }

    #[test]
    fn test_prefers_least_loaded_over_strongest() {
        let mut registry = registry(&["ap1", "ap2"]);
        load(&mut registry, "ap1", 2);
        let snap = snapshot(&registry, &[("ap1", -50.0, true), ("ap2", -85.0, true)]);
        let decision = LeastLoadedFirst::default()
            .decide(&AssociationState::Disconnected, &snap, &registry)
            .unwrap();
        assert_eq!(
            decision,
            Decision::Switch {
                target: ApId::new("ap2"),
                trigger_value: 1.0,
                current_value: None,
            }
        );
    }

    #[test]
    fn test_single_station_does_not_ping_pong() {
        let mut registry = registry(&["ap1", "ap2"]);
        load(&mut registry, "ap1", 1);
        let snap = snapshot(&registry, &[("ap1", -60.0, true), ("ap2", -60.0, true)]);
        let decision = LeastLoadedFirst::default()
            .decide(&AssociationState::connected("ap1"), &snap, &registry)
            .unwrap();
        assert_eq!(decision.kind(), crate::policy::DecisionKind::Stay);
    }

    #[test]
    fn test_switches_when_gap_reaches_delta() {
        let mut registry = registry(&["ap1", "ap2"]);
        load(&mut registry, "ap1", 2);
        let snap = snapshot(&registry, &[("ap1", -60.0, true), ("ap2", -70.0, true)]);

        // Serving ap1 at 2.0, joining ap2 would give 1.0.
        let decision = LeastLoadedFirst::new(1.0)
            .decide(&AssociationState::connected("ap1"), &snap, &registry)
            .unwrap();
        assert_eq!(decision.target(), Some(&ApId::new("ap2")));

        let decision = LeastLoadedFirst::new(1.5)
            .decide(&AssociationState::connected("ap1"), &snap, &registry)
            .unwrap();
        assert_eq!(
            decision,
            Decision::Stay {
                reason: StayReason::BelowMargin
            }
        );
    }

    #[test]
    fn test_multiplier_weights_the_load() {
        let mut registry = ApRegistry::new(&[
            AccessPointConfig::new("ap1", (0.0, 0.0), 100.0),
            AccessPointConfig::new("ap2", (0.0, 0.0), 100.0).with_load_multiplier(2.5),
        ]);
        load(&mut registry, "ap1", 2);
        let snap = snapshot(&registry, &[("ap1", -60.0, true), ("ap2", -60.0, true)]);

        // ap1 would be 3.0 after joining, ap2 2.5.
        let decision = LeastLoadedFirst::default()
            .decide(&AssociationState::Disconnected, &snap, &registry)
            .unwrap();
        assert_eq!(decision.target(), Some(&ApId::new("ap2")));

        // Already on ap1 (2.0) versus 2.5 on ap2: stay.
        let decision = LeastLoadedFirst::default()
            .decide(&AssociationState::connected("ap1"), &snap, &registry)
            .unwrap();
        assert_eq!(
            decision,
            Decision::Stay {
                reason: StayReason::CurrentIsBest
            }
        );
    }

    #[test]
    fn test_chosen_ap_is_minimum_with_lowest_id_tie() {
        let mut registry = registry(&["ap1", "ap2", "ap3", "ap4"]);
        load(&mut registry, "ap1", 3);
        load(&mut registry, "ap2", 1);
        load(&mut registry, "ap3", 1);
        let snap = snapshot(
            &registry,
            &[("ap1", -40.0, true), ("ap2", -70.0, true), ("ap3", -65.0, true), ("ap4", -60.0, false)],
        );
        let decision = LeastLoadedFirst::default()
            .decide(&AssociationState::connected("ap1"), &snap, &registry)
            .unwrap();
        assert_eq!(decision.target(), Some(&ApId::new("ap2")));
    }
}
