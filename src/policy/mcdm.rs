//! Multi-Criteria Decision Making.
//!
//! Each in-range AP gets a composite score
//!
//! ```text
//! s = (rssi - min_rssi) / (max_rssi - min_rssi)
//! l = 1 - load / max_load
//! score = w_signal * s + w_load * l
//! ```
//!
//! where the min/max are taken over the in-range candidates of the current
//! tick and `load` is the capacity-weighted load the station would see. When
//! every candidate has the same RSSI the signal score is 1 for everyone; the
//! load score falls back to 1 only when `max_load` is zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{best_candidate, Decision, DecisionContext, HandoverPolicy, Prefer, StayReason, TIE_TOLERANCE};
use crate::config::Weights;
use crate::error::Result;
use crate::types::{ApId, PolicyKind};

/// Normalized criteria and composite score of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub signal: f64,
    pub load: f64,
    pub composite: f64,
}

/// Score `(rssi_dbm, load)` pairs against each other. Output order matches
/// input order.
pub fn composite_scores(inputs: &[(f64, f64)], weights: Weights) -> Vec<CandidateScore> {
    let (min_rssi, max_rssi) = bounds(inputs.iter().map(|&(rssi, _)| rssi));
    let max_load = inputs.iter().map(|&(_, load)| load).fold(0.0, f64::max);

    let signal_span = max_rssi - min_rssi;

    inputs
        .iter()
        .map(|&(rssi, load)| {
            let signal = if signal_span <= TIE_TOLERANCE {
                1.0
            } else {
                ((rssi - min_rssi) / signal_span).clamp(0.0, 1.0)
            };
            let load = if max_load <= TIE_TOLERANCE {
                1.0
            } else {
                (1.0 - load / max_load).clamp(0.0, 1.0)
            };
            CandidateScore {
                signal,
                load,
                composite: weights.signal * signal + weights.load * load,
            }
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Switches to the best-scoring AP once its score beats the serving AP's by
/// at least `min_score_margin`.
#[derive(Debug, Clone)]
pub struct MultiCriteria {
    weights: Weights,
    min_score_margin: f64,
}

impl MultiCriteria {
    pub fn new(weights: Weights, min_score_margin: f64) -> Self {
        Self {
            weights,
            min_score_margin,
        }
    }

    /// Scores of every in-range candidate, in id order.
    pub fn score(&self, ctx: &DecisionContext<'_>) -> Result<Vec<(ApId, CandidateScore)>> {
        let inputs = ctx
            .candidates
            .iter()
            .map(|m| ctx.attached_load(&m.ap_id).map(|load| (m.rssi_dbm, load)))
            .collect::<Result<Vec<_>>>()?;

        Ok(ctx
            .candidates
            .iter()
            .map(|m| m.ap_id.clone())
            .zip(composite_scores(&inputs, self.weights))
            .collect())
    }
}

impl Default for MultiCriteria {
    fn default() -> Self {
        Self::new(Weights::default(), 0.05)
    }
}

impl HandoverPolicy for MultiCriteria {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Mcdm
    }

    fn description(&self) -> String {
        format!(
            "MCDM: signal {:.2} / load {:.2}, min margin {:.3}",
            self.weights.signal, self.weights.load, self.min_score_margin
        )
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        let mut params = BTreeMap::new();
        params.insert("weight_signal".to_string(), self.weights.signal);
        params.insert("weight_load".to_string(), self.weights.load);
        params.insert("min_score_margin".to_string(), self.min_score_margin);
        params
    }

    fn select(&self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let scores = self.score(ctx)?;
        let scored = ctx
            .candidates
            .iter()
            .copied()
            .zip(scores.iter().map(|(_, s)| s.composite));

        let Some((best, best_score)) = best_candidate(scored, Prefer::Highest) else {
            return Ok(Decision::Stay {
                reason: StayReason::NoSignal,
            });
        };

        if ctx.is_serving(&best.ap_id) {
            return Ok(Decision::Stay {
                reason: StayReason::CurrentIsBest,
            });
        }

        let current = ctx.serving.and_then(|serving| {
            scores
                .iter()
                .find(|(id, _)| id == &serving.ap_id)
                .map(|(_, s)| s.composite)
        });

        if best_score - current.unwrap_or(f64::NEG_INFINITY) >= self.min_score_margin - TIE_TOLERANCE {
            tracing::trace!(
                station = %ctx.snapshot.station_id,
                candidate = %best.ap_id,
                score = best_score,
                "MCDM margin cleared"
            );
            return Ok(Decision::Switch {
                target: best.ap_id.clone(),
                trigger_value: best_score,
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

    #[test]
    fn test_uniform_signal_scores_one() {
        let scores = composite_scores(&[(-60.0, 1.0), (-60.0, 2.0)], Weights::default());
        for score in &scores {
            assert!((score.signal - 1.0).abs() < 1e-12);
        }
        assert!((scores[0].load - 0.5).abs() < 1e-12);
        assert!(scores[1].load.abs() < 1e-12);
    }

    #[test]
    fn test_equal_loads_use_the_formula() {
        let scores = composite_scores(&[(-60.0, 2.0), (-70.0, 2.0)], Weights::default());
        for score in &scores {
            assert!(score.load.abs() < 1e-12);
        }
        assert!((scores[0].composite - 0.6).abs() < 1e-12);

        let idle = composite_scores(&[(-60.0, 0.0), (-70.0, 0.0)], Weights::default());
        for score in &idle {
            assert!((score.load - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_raising_load_to_match_others_never_helps() {
        let weights = Weights::default();
        let lighter = composite_scores(&[(-60.0, 1.0), (-70.0, 2.0)], weights)[0].composite;
        let matched = composite_scores(&[(-60.0, 2.0), (-70.0, 2.0)], weights)[0].composite;
        assert!(matched <= lighter, "{lighter} -> {matched}");
    }

    #[test]
    fn test_normalization() {
        let scores = composite_scores(
            &[(-50.0, 1.0), (-60.0, 2.0), (-70.0, 4.0)],
            Weights::default(),
        );
        assert!((scores[0].signal - 1.0).abs() < 1e-12);
        assert!((scores[1].signal - 0.5).abs() < 1e-12);
        assert!(scores[2].signal.abs() < 1e-12);
        assert!((scores[0].load - 0.75).abs() < 1e-12);
        assert!((scores[1].load - 0.5).abs() < 1e-12);
        assert!(scores[2].load.abs() < 1e-12);
        assert!((scores[0].composite - (0.6 + 0.4 * 0.75)).abs() < 1e-12);
    }

    #[test]
    fn test_score_monotone_in_rssi_and_load() {
        let weights = Weights::default();
        // Second set: every other AP carries 1.5, which the load grid crosses.
        for others in [
            vec![(-62.0, 1.5), (-75.0, 1.0), (-58.0, 2.5)],
            vec![(-62.0, 1.5), (-75.0, 1.5)],
        ] {
            check_monotone(&others, weights);
        }
    }

    fn check_monotone(others: &[(f64, f64)], weights: Weights) {
        let score_of = |rssi: f64, load: f64| {
            let mut inputs = vec![(rssi, load)];
            inputs.extend_from_slice(others);
            composite_scores(&inputs, weights)[0].composite
        };

        for load_step in 0..=12 {
            let load = 0.5 + f64::from(load_step) * 0.25;
            let mut last = f64::NEG_INFINITY;
            for rssi_step in 0..=60 {
                let rssi = -90.0 + f64::from(rssi_step);
                let score = score_of(rssi, load);
                assert!(score + 1e-12 >= last, "rssi {rssi} load {load}");
                last = score;
            }
        }

        for rssi_step in 0..=60 {
            let rssi = -90.0 + f64::from(rssi_step);
            let mut last = f64::INFINITY;
            for load_step in 0..=12 {
                let load = 0.5 + f64::from(load_step) * 0.25;
                let score = score_of(rssi, load);
                assert!(score <= last + 1e-12, "rssi {rssi} load {load}");
                last = score;
            }
        }
    }

    #[test]
    fn test_lower_load_wins_over_slightly_stronger_signal() {
        let registry = ApRegistry::new(&[
            AccessPointConfig::new("ap1", (0.0, 0.0), 100.0),
            AccessPointConfig::new("ap2", (0.0, 0.0), 100.0).with_load_multiplier(2.5),
            AccessPointConfig::new("ap3", (0.0, 0.0), 100.0).with_load_multiplier(1.5),
        ]);
        let snap = snapshot(
            &registry,
            &[("ap1", -73.0, true), ("ap2", -68.0, true), ("ap3", -69.0, true)],
        );
        let decision = MultiCriteria::default()
            .decide(&AssociationState::Disconnected, &snap, &registry)
            .unwrap();
        assert_eq!(decision.target(), Some(&ApId::new("ap3")));
    }

    #[test]
    fn test_margin_blocks_marginal_improvement() {
        let mut registry = registry(&["ap1", "ap2"]);
        registry.increment_load(&ApId::new("ap1")).unwrap();
        registry.increment_load(&ApId::new("ap2")).unwrap();
        // ap2 has the signal edge, ap1 the load edge (1.0 serving vs 2.0 joining).
        let snap = snapshot(&registry, &[("ap1", -61.0, true), ("ap2", -60.0, true)]);
        let state = AssociationState::connected("ap1");

        // ap1: s=0, l=1-1/2=0.5 -> 0.2 ; ap2: s=1, l=0 -> 0.6
        let decision = MultiCriteria::new(Weights::default(), 0.5)
            .decide(&state, &snap, &registry)
            .unwrap();
        assert_eq!(
            decision,
            Decision::Stay {
                reason: StayReason::BelowMargin
            }
        );

        let decision = MultiCriteria::new(Weights::default(), 0.3)
            .decide(&state, &snap, &registry)
            .unwrap();
        assert_eq!(decision.target(), Some(&ApId::new("ap2")));
    }
}
