//! Simulation Engine
//!
//! Drives the per-tick pipeline for every station, strictly in order:
//!
//! ```text
//! Mobility -> position -> Propagation -> snapshot -> Policy -> decision
//!          -> registry commit (on switch) -> Metrics
//! ```
//!
//! Within a tick stations are processed in identifier order and each
//! station's pipeline completes before the next one starts, so a later
//! station sees every association change made by an earlier one. The
//! registry is mutated only inside [`Simulation::commit_switch`] and
//! [`Simulation::commit_disconnect`]; both re-check the registry
//! consistency invariant before returning.

use tracing::{debug, info, trace};

use crate::config::ScenarioConfig;
use crate::error::{InvariantViolation, Result};
use crate::measurement::MeasurementSnapshot;
use crate::metrics::{HandoverEvent, MetricsCollector, RunResult};
use crate::mobility::MobilityDriver;
use crate::policy::{self, AssociationState, Decision, HandoverPolicy, StayReason};
use crate::propagation::{PropagationModel, Shadowing};
use crate::registry::ApRegistry;
use crate::types::{ApId, StationId};

// ============================================================================
// Emulator Hook
// ============================================================================

/// Receives association commands after each confirmed change, e.g. to drive
/// an external network emulator.
pub trait AssociationController {
    fn associate(&mut self, station: &StationId, from: Option<&ApId>, to: &ApId);

    fn disassociate(&mut self, station: &StationId, ap: &ApId);
}

/// Controller that ignores every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullController;

impl AssociationController for NullController {
    fn associate(&mut self, _station: &StationId, _from: Option<&ApId>, _to: &ApId) {}

    fn disassociate(&mut self, _station: &StationId, _ap: &ApId) {}
}

/// An association command as issued to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationCommand {
    Associate {
        station: StationId,
        from: Option<ApId>,
        to: ApId,
    },
    Disassociate {
        station: StationId,
        ap: ApId,
    },
}

/// Controller that keeps every command it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingController {
    pub commands: Vec<AssociationCommand>,
}

impl AssociationController for RecordingController {
    fn associate(&mut self, station: &StationId, from: Option<&ApId>, to: &ApId) {
        self.commands.push(AssociationCommand::Associate {
            station: station.clone(),
            from: from.cloned(),
            to: to.clone(),
        });
    }

    fn disassociate(&mut self, station: &StationId, ap: &ApId) {
        self.commands.push(AssociationCommand::Disassociate {
            station: station.clone(),
            ap: ap.clone(),
        });
    }
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone)]
struct StationRuntime {
    id: StationId,
    state: AssociationState,
}

/// One policy run over a validated scenario.
pub struct Simulation<C = NullController> {
    config: ScenarioConfig,
    registry: ApRegistry,
    mobility: MobilityDriver,
    propagation: PropagationModel,
    shadowing: Option<Shadowing>,
    policy: Box<dyn HandoverPolicy>,
    stations: Vec<StationRuntime>,
    metrics: MetricsCollector,
    controller: C,
    tick: usize,
}

impl Simulation<NullController> {
    /// Validate `config` and prepare a run.
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        Self::with_controller(config, NullController)
    }
}

impl<C: AssociationController> Simulation<C> {
    /// Validate `config` and prepare a run that reports association
    /// changes to `controller`.
    pub fn with_controller(config: ScenarioConfig, controller: C) -> Result<Self> {
        config.validate()?;

        let mut registry = ApRegistry::new(&config.access_points);
        let mut stations: Vec<StationRuntime> = config
            .stations
            .iter()
            .map(|s| StationRuntime {
                id: s.id.clone(),
                state: AssociationState::Disconnected,
            })
            .collect();
        stations.sort_by(|a, b| a.id.cmp(&b.id));

        for station in &config.stations {
            if let Some(ap) = &station.initial_ap {
                registry.increment_load(ap)?;
                if let Some(runtime) = stations.iter_mut().find(|s| s.id == station.id) {
                    runtime.state = AssociationState::connected(ap.clone());
                }
            }
        }
        registry.verify_consistency(stations.iter().filter_map(|s| s.state.serving()))?;

        let policy = policy::build(&config.policy);
        info!(
            scenario = %config.name,
            policy = %policy.kind(),
            aps = registry.len(),
            stations = stations.len(),
            "{}",
            policy.description()
        );

        Ok(Self {
            mobility: MobilityDriver::new(&config.stations),
            propagation: PropagationModel::from_policy(&config.policy),
            shadowing: Shadowing::new(config.policy.shadowing_sigma_db, config.policy.seed),
            metrics: MetricsCollector::new(policy.kind()),
            policy,
            registry,
            stations,
            controller,
            tick: 0,
            config,
        })
    }

    /// Index of the next tick to process.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Total number of ticks in the run.
    pub fn tick_count(&self) -> usize {
        self.mobility.tick_count()
    }

    pub fn is_complete(&self) -> bool {
        self.tick >= self.tick_count()
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn registry(&self) -> &ApRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &dyn HandoverPolicy {
        self.policy.as_ref()
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Current association state of `station`.
    pub fn state_of(&self, station: &StationId) -> Option<&AssociationState> {
        self.stations
            .iter()
            .find(|s| &s.id == station)
            .map(|s| &s.state)
    }

    /// `(station, serving AP)` for every station, in station order.
    pub fn associations(&self) -> impl Iterator<Item = (&StationId, Option<&ApId>)> {
        self.stations.iter().map(|s| (&s.id, s.state.serving()))
    }

    /// Process one tick for every station. Returns `false` once the run is
    /// complete and nothing was processed.
    pub fn step(&mut self) -> Result<bool> {
        if self.is_complete() {
            return Ok(false);
        }

        let _span = tracing::debug_span!("tick", tick = self.tick).entered();
        for index in 0..self.stations.len() {
            self.process_station(index)?;
        }
        self.tick += 1;
        Ok(true)
    }

    /// Run every remaining tick and return the collected log.
    pub fn run(mut self) -> Result<RunResult> {
        while self.step()? {}
        Ok(self.into_result())
    }

    /// Finish the run, discarding any ticks not yet processed.
    pub fn into_result(self) -> RunResult {
        let parameters = self.policy.parameters();
        self.metrics
            .finish(self.config.name.clone(), self.tick, parameters)
    }

    fn process_station(&mut self, index: usize) -> Result<()> {
        let tick = self.tick;
        let station_id = self.stations[index].id.clone();
        let Some(position) = self.mobility.position_at(&station_id, tick) else {
            return Ok(());
        };

        let snapshot = MeasurementSnapshot::capture(
            tick,
            &station_id,
            position,
            &self.registry,
            &self.propagation,
            self.shadowing.as_mut(),
        );
        trace!(station = %station_id, position = %position, "measured {} APs", snapshot.entries().len());

        let state = self.stations[index].state.clone();
        let decision = self.policy.decide(&state, &snapshot, &self.registry)?;

        let switched = match &decision {
            Decision::Switch {
                target,
                trigger_value,
                ..
            } => {
                self.commit_switch(index, &snapshot, target, *trigger_value)?;
                true
            }
            Decision::Disconnect => {
                self.commit_disconnect(index)?;
                false
            }
            Decision::Stay { reason } => {
                if *reason == StayReason::NoSignal {
                    debug!(station = %station_id, tick, "no access point in range");
                }
                false
            }
        };

        let serving = self.stations[index].state.serving().cloned();
        if let Some(ap) = &serving {
            if !snapshot.is_in_range(ap) {
                return Err(InvariantViolation::OutOfRangeAssociation {
                    station: station_id,
                    ap: ap.clone(),
                    tick,
                }
                .into());
            }
        }

        self.metrics
            .record_tick(&snapshot, serving, &decision, switched);
        Ok(())
    }

    /// Confirmed handover: `CONNECTED(ap) -> EVALUATING(ap, target) ->
    /// CONNECTED(target)`, or `DISCONNECTED -> CONNECTED(target)`.
    fn commit_switch(
        &mut self,
        index: usize,
        snapshot: &MeasurementSnapshot,
        target: &ApId,
        trigger_value: f64,
    ) -> Result<()> {
        let station_id = self.stations[index].id.clone();
        let from = self.stations[index].state.serving().cloned();

        if from.as_ref() == Some(target) {
            return Err(InvariantViolation::StaleDecision {
                station: station_id,
                ap: target.clone(),
                reason: "already associated",
            }
            .into());
        }
        if !snapshot.is_in_range(target) {
            return Err(InvariantViolation::StaleDecision {
                station: station_id,
                ap: target.clone(),
                reason: "target not in range",
            }
            .into());
        }

        if let Some(serving) = &from {
            self.stations[index].state = AssociationState::Evaluating {
                serving: serving.clone(),
                candidate: target.clone(),
            };
            debug!(station = %station_id, state = %self.stations[index].state, "committing handover");
            self.registry
                .decrement_load(serving)
                .map_err(|e| e.into_invariant())?;
        }
        self.registry
            .increment_load(target)
            .map_err(|e| e.into_invariant())?;
        self.stations[index].state = AssociationState::connected(target.clone());
        self.verify_registry()?;

        self.controller
            .associate(&station_id, from.as_ref(), target);

        info!(
            tick = self.tick,
            station = %station_id,
            from = from.as_ref().map_or("none", ApId::as_str),
            to = %target,
            trigger = trigger_value,
            policy = %self.policy.kind(),
            "handover"
        );

        self.metrics.record_event(HandoverEvent {
            tick: self.tick,
            station_id,
            policy: self.policy.kind(),
            from_ap_id: from,
            to_ap_id: target.clone(),
            trigger_metric_value: trigger_value,
        });
        Ok(())
    }

    /// Signal loss: `CONNECTED(ap) -> DISCONNECTED`.
    fn commit_disconnect(&mut self, index: usize) -> Result<()> {
        let station_id = self.stations[index].id.clone();
        let Some(serving) = self.stations[index].state.serving().cloned() else {
            return Ok(());
        };

        self.registry
            .decrement_load(&serving)
            .map_err(|e| e.into_invariant())?;
        self.stations[index].state = AssociationState::Disconnected;
        self.verify_registry()?;

        self.controller.disassociate(&station_id, &serving);
        info!(tick = self.tick, station = %station_id, ap = %serving, "signal lost, disconnected");
        Ok(())
    }

    fn verify_registry(&self) -> Result<()> {
        self.registry
            .verify_consistency(self.stations.iter().filter_map(|s| s.state.serving()))
    }
}

/// Validate `config` and run it to completion.
pub fn run(config: &ScenarioConfig) -> Result<RunResult> {
    Simulation::new(config.clone())?.run()
}
