//! Canned scenarios.
//!
//! Reference layouts used to compare the policies against each other. Every
//! builder returns a validated-by-construction [`ScenarioConfig`]; tune the
//! policy parameters on the returned value before running.

use crate::config::{AccessPointConfig, PolicyConfig, ScenarioConfig, StationConfig};
use crate::mobility::Path;
use crate::types::{PolicyKind, Position};

/// Waypoints of the walk through the four-AP area.
pub const ZIG_ZAG_PATH: [(f64, f64); 17] = [
    (15.0, 25.0),
    (25.0, 25.0),
    (35.0, 25.0),
    (45.0, 35.0),
    (50.0, 45.0),
    (55.0, 55.0),
    (60.0, 65.0),
    (70.0, 60.0),
    (80.0, 50.0),
    (90.0, 40.0),
    (100.0, 35.0),
    (105.0, 30.0),
    (105.0, 20.0),
    (100.0, 10.0),
    (90.0, 10.0),
    (80.0, 10.0),
    (70.0, 10.0),
];

/// Two APs 80 m apart; one station walks along the corridor from x = 10 to
/// x = 120 in 5 m steps.
pub fn two_ap_corridor(policy: PolicyKind) -> ScenarioConfig {
    ScenarioConfig {
        name: "two-ap-corridor".into(),
        access_points: vec![
            AccessPointConfig::new("ap1", (20.0, 40.0), 60.0),
            AccessPointConfig::new("ap2", (100.0, 40.0), 60.0),
        ],
        stations: vec![StationConfig::new(
            "sta1",
            Path::linear(Position::new(10.0, 20.0), Position::new(120.0, 20.0), 5.0).into(),
        )],
        policy: PolicyConfig {
            path_loss_exponent: 3.0,
            ..PolicyConfig::new(policy)
        },
        ..Default::default()
    }
}

/// The corridor with two static stations parked on ap1 from the start.
pub fn two_ap_loaded(policy: PolicyKind) -> ScenarioConfig {
    let mut config = two_ap_corridor(policy);
    config.name = "two-ap-loaded".into();
    config.stations.extend([
        StationConfig::new("sta2", Path::stationary(Position::new(15.0, 45.0)).into())
            .associated_with("ap1"),
        StationConfig::new("sta3", Path::stationary(Position::new(25.0, 35.0)).into())
            .associated_with("ap1"),
    ]);
    config
}

/// Four APs of unequal capacity and a zig-zag walk across all of them.
pub fn four_ap_congestion(policy: PolicyKind) -> ScenarioConfig {
    ScenarioConfig {
        name: "four-ap-congestion".into(),
        access_points: four_ap_layout(),
        stations: vec![StationConfig::new(
            "sta1",
            ZIG_ZAG_PATH.iter().copied().map(Position::from).collect(),
        )],
        policy: PolicyConfig::new(policy),
        ..Default::default()
    }
}

/// The four-AP layout with a single station standing at `at`.
pub fn four_ap_probe(policy: PolicyKind, at: Position) -> ScenarioConfig {
    ScenarioConfig {
        name: "four-ap-probe".into(),
        access_points: four_ap_layout(),
        stations: vec![StationConfig::new("sta1", Path::stationary(at).into())],
        policy: PolicyConfig::new(policy),
        ..Default::default()
    }
}

fn four_ap_layout() -> Vec<AccessPointConfig> {
    vec![
        AccessPointConfig::new("ap1", (30.0, 50.0), 50.0),
        AccessPointConfig::new("ap2", (100.0, 50.0), 50.0).with_load_multiplier(2.5),
        AccessPointConfig::new("ap3", (60.0, 70.0), 50.0).with_load_multiplier(1.5),
        AccessPointConfig::new("ap4", (90.0, 10.0), 50.0),
    ]
}
