//! Handover Policies
//!
//! A policy looks at one station's measurement snapshot and the registry and
//! decides whether the station stays, switches, or loses its association.
//! Policies never mutate the registry; the engine commits their decisions.
//!
//! The shared part of every policy lives in [`HandoverPolicy::decide`]: it
//! validates the serving AP, handles the no-signal case, and only then hands
//! the in-range candidates to the policy-specific [`HandoverPolicy::select`].

mod llf;
mod mcdm;
mod ssf;

pub use llf::LeastLoadedFirst;
pub use mcdm::{composite_scores, CandidateScore, MultiCriteria};
pub use ssf::StrongestSignalFirst;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::error::{InvariantViolation, Result};
use crate::measurement::{ApMeasurement, MeasurementSnapshot};
use crate::registry::ApRegistry;
use crate::types::{ApId, PolicyKind};

/// Values closer than this are treated as equal; ties go to the lowest id.
pub const TIE_TOLERANCE: f64 = 1e-9;

// ============================================================================
// State Machine
// ============================================================================

/// Association state of one station.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssociationState {
    #[default]
    Disconnected,
    Connected { ap: ApId },
    /// Transient: a switch has been decided but not yet committed.
    Evaluating { serving: ApId, candidate: ApId },
}

impl AssociationState {
    pub fn connected(ap: impl Into<ApId>) -> Self {
        Self::Connected { ap: ap.into() }
    }

    /// The AP the station is associated with right now.
    pub fn serving(&self) -> Option<&ApId> {
        match self {
            Self::Disconnected => None,
            Self::Connected { ap } => Some(ap),
            Self::Evaluating { serving, .. } => Some(serving),
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for AssociationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("DISCONNECTED"),
            Self::Connected { ap } => write!(f, "CONNECTED({ap})"),
            Self::Evaluating { serving, candidate } => {
                write!(f, "EVALUATING({serving}, {candidate})")
            }
        }
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// Why a station keeps its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StayReason {
    /// No access point in range and the station is already disconnected.
    NoSignal,
    /// The serving AP is already the policy's best choice.
    CurrentIsBest,
    /// A better AP exists but its advantage does not clear the margin.
    BelowMargin,
}

/// Output of a policy for one station at one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Stay {
        reason: StayReason,
    },
    Switch {
        target: ApId,
        /// Criterion value of the target (RSSI, attached load or score).
        trigger_value: f64,
        /// Same criterion for the serving AP, when it is in range.
        current_value: Option<f64>,
    },
    /// The serving AP dropped out of range and nothing qualifies.
    Disconnect,
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Stay { .. } => DecisionKind::Stay,
            Self::Switch { .. } => DecisionKind::Switch,
            Self::Disconnect => DecisionKind::Disconnect,
        }
    }

    pub fn target(&self) -> Option<&ApId> {
        match self {
            Self::Switch { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Decision label used in the per-tick trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Stay,
    Switch,
    Disconnect,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stay => f.write_str("stay"),
            Self::Switch => f.write_str("switch"),
            Self::Disconnect => f.write_str("disconnect"),
        }
    }
}

// ============================================================================
// Policy Trait
// ============================================================================

/// Everything a policy may look at while deciding.
pub struct DecisionContext<'a> {
    pub state: &'a AssociationState,
    pub snapshot: &'a MeasurementSnapshot,
    pub registry: &'a ApRegistry,
    /// Serving AP measurement, present only while it is in range.
    pub serving: Option<&'a ApMeasurement>,
    /// In-range access points in id order (serving AP included).
    pub candidates: Vec<&'a ApMeasurement>,
}

impl<'a> DecisionContext<'a> {
    fn new(
        state: &'a AssociationState,
        snapshot: &'a MeasurementSnapshot,
        registry: &'a ApRegistry,
    ) -> Result<Self> {
        let serving = match state.serving() {
            Some(ap) => {
                registry.get(ap).map_err(|e| e.into_invariant())?;
                let measured = snapshot
                    .get(ap)
                    .ok_or_else(|| InvariantViolation::UnknownAccessPoint(ap.clone()))?;
                measured.in_range.then_some(measured)
            }
            None => None,
        };

        Ok(Self {
            state,
            snapshot,
            registry,
            serving,
            candidates: snapshot.in_range().collect(),
        })
    }

    pub fn serving_id(&self) -> Option<&ApId> {
        self.state.serving()
    }

    pub fn is_serving(&self, ap: &ApId) -> bool {
        self.serving_id() == Some(ap)
    }

    /// In-range candidates other than the serving AP.
    pub fn alternatives(&self) -> impl Iterator<Item = &'a ApMeasurement> + '_ {
        self.candidates
            .iter()
            .copied()
            .filter(move |m| !self.is_serving(&m.ap_id))
    }

    /// Capacity-weighted load this station would see on `ap`, read from the
    /// registry at call time.
    pub fn attached_load(&self, ap: &ApId) -> Result<f64> {
        let entry = self.registry.get(ap).map_err(|e| e.into_invariant())?;
        Ok(entry.attached_load(self.is_serving(ap)))
    }
}

/// Handover decision policy.
pub trait HandoverPolicy: Send + Sync {
    /// Policy identifier.
    fn kind(&self) -> PolicyKind;

    /// Human-readable description including parameters.
    fn description(&self) -> String;

    /// Tuning parameters for reporting.
    fn parameters(&self) -> BTreeMap<String, f64>;

    /// Policy-specific choice among in-range candidates. Only called when at
    /// least one access point is in range.
    fn select(&self, ctx: &DecisionContext<'_>) -> Result<Decision>;

    /// Decide for one station at one tick.
    fn decide(
        &self,
        state: &AssociationState,
        snapshot: &MeasurementSnapshot,
        registry: &ApRegistry,
    ) -> Result<Decision> {
        let ctx = DecisionContext::new(state, snapshot, registry)?;

        if ctx.candidates.is_empty() {
            return Ok(if state.is_connected() {
                Decision::Disconnect
            } else {
                Decision::Stay {
                    reason: StayReason::NoSignal,
                }
            });
        }

        self.select(&ctx)
    }
}

/// Build the policy selected by `config`.
pub fn build(config: &PolicyConfig) -> Box<dyn HandoverPolicy> {
    match config.policy {
        PolicyKind::Ssf => Box::new(StrongestSignalFirst::new(config.hysteresis_margin_db)),
        PolicyKind::Llf => Box::new(LeastLoadedFirst::new(config.min_load_delta)),
        PolicyKind::Mcdm => Box::new(MultiCriteria::new(config.weights, config.min_score_margin)),
    }
}

/// Which end of a criterion is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefer {
    Highest,
    Lowest,
}

/// Best `(candidate, value)` pair. `items` must be in id order; a later item
/// replaces the current best only when strictly better beyond
/// [`TIE_TOLERANCE`], so ties resolve to the lowest id.
pub(crate) fn best_candidate<'a, I>(items: I, prefer: Prefer) -> Option<(&'a ApMeasurement, f64)>
where
    I: IntoIterator<Item = (&'a ApMeasurement, f64)>,
{
    items.into_iter().fold(None, |best, (m, value)| match best {
        None => Some((m, value)),
        Some((_, best_value)) => {
            let better = match prefer {
                Prefer::Highest => value > best_value + TIE_TOLERANCE,
                Prefer::Lowest => value < best_value - TIE_TOLERANCE,
            };
            if better {
                Some((m, value))
            } else {
                best
            }
        }
    })
}
