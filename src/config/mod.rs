//! Configuration management.
//!
//! A [`ScenarioConfig`] is validated eagerly: every invalid field is
//! collected into one [`Error::Configuration`] so a caller sees all problems
//! at once instead of fixing them one run at a time.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigIssue, Error, Result};
use crate::propagation::PropagationModel;
use crate::types::{ApId, PolicyKind, Position, StationId};

/// Tolerance used when checking that the MCDM weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Full description of one simulation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Free-form scenario name used in logs and reports.
    #[serde(default)]
    pub name: String,

    /// Access points in the area.
    #[serde(default)]
    pub access_points: Vec<AccessPointConfig>,

    /// Stations and their paths.
    #[serde(default)]
    pub stations: Vec<StationConfig>,

    /// Policy and radio parameters.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScenarioConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Parse(format!("{e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(format!("{e}")))
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml_string()?)?;
        Ok(())
    }

    /// Same scenario under a different policy.
    pub fn with_policy(&self, policy: PolicyKind) -> Self {
        let mut config = self.clone();
        config.policy.policy = policy;
        config
    }

    /// Validate every field, collecting all issues.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        if self.access_points.is_empty() {
            issues.push(ConfigIssue::new("access_points", "at least one access point is required"));
        }

        let mut seen_aps = HashSet::new();
        for ap in &self.access_points {
            ap.validate(&mut issues);
            if !seen_aps.insert(&ap.id) {
                issues.push(ConfigIssue::new(
                    format!("access_points[{}].id", ap.id),
                    "duplicate access point id",
                ));
            }
        }

        if self.stations.is_empty() {
            issues.push(ConfigIssue::new("stations", "at least one station is required"));
        }

        let aps: BTreeMap<&ApId, &AccessPointConfig> =
            self.access_points.iter().map(|ap| (&ap.id, ap)).collect();
        let propagation = PropagationModel::from_policy(&self.policy);

        let mut seen_stations = HashSet::new();
        for station in &self.stations {
            station.validate(&mut issues);
            if !seen_stations.insert(&station.id) {
                issues.push(ConfigIssue::new(
                    format!("stations[{}].id", station.id),
                    "duplicate station id",
                ));
            }

            let Some(initial) = &station.initial_ap else {
                continue;
            };
            let field = format!("stations[{}].initial_ap", station.id);
            match (aps.get(initial), station.path.first()) {
                (None, _) => {
                    issues.push(ConfigIssue::new(field, format!("unknown access point {initial}")));
                }
                (Some(ap), Some(start)) if ap.is_valid() && start.is_finite() => {
                    let distance = start.distance_to(&ap.position);
                    if !propagation.in_range(distance, ap.range_m) {
                        issues.push(ConfigIssue::new(
                            field,
                            format!("{initial} is out of range at the first path position {start}"),
                        ));
                    }
                }
                _ => {}
            }
        }

        self.policy.validate(&mut issues);

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(issues))
        }
    }
}

/// Static access point attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPointConfig {
    pub id: ApId,
    pub position: Position,
    /// Coverage radius in meters.
    pub range_m: f64,
    /// Relative capacity cost per associated station.
    #[serde(default = "default_load_multiplier")]
    pub load_multiplier: f64,
}

fn default_load_multiplier() -> f64 {
    1.0
}

impl AccessPointConfig {
    pub fn new(id: impl Into<ApId>, position: impl Into<Position>, range_m: f64) -> Self {
        Self {
            id: id.into(),
            position: position.into(),
            range_m,
            load_multiplier: default_load_multiplier(),
        }
    }

    pub fn with_load_multiplier(mut self, multiplier: f64) -> Self {
        self.load_multiplier = multiplier;
        self
    }

    fn is_valid(&self) -> bool {
        self.position.is_finite() && self.range_m.is_finite() && self.range_m > 0.0
    }

    fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        let prefix = format!("access_points[{}]", self.id);
        if self.id.as_str().is_empty() {
            issues.push(ConfigIssue::new(format!("{prefix}.id"), "must not be empty"));
        }
        if !self.position.is_finite() {
            issues.push(ConfigIssue::new(format!("{prefix}.position"), "coordinates must be finite"));
        }
        if !(self.range_m.is_finite() && self.range_m > 0.0) {
            issues.push(ConfigIssue::new(
                format!("{prefix}.range_m"),
                format!("must be positive, got {}", self.range_m),
            ));
        }
        if !(self.load_multiplier.is_finite() && self.load_multiplier > 0.0) {
            issues.push(ConfigIssue::new(
                format!("{prefix}.load_multiplier"),
                format!("must be positive, got {}", self.load_multiplier),
            ));
        }
    }
}

/// A station and the positions it visits, one per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: StationId,
    #[serde(default)]
    pub path: Vec<Position>,
    /// Association in place before the first tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_ap: Option<ApId>,
}

impl StationConfig {
    pub fn new(id: impl Into<StationId>, path: Vec<Position>) -> Self {
        Self {
            id: id.into(),
            path,
            initial_ap: None,
        }
    }

    pub fn associated_with(mut self, ap: impl Into<ApId>) -> Self {
        self.initial_ap = Some(ap.into());
        self
    }

    fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        let prefix = format!("stations[{}]", self.id);
        if self.id.as_str().is_empty() {
            issues.push(ConfigIssue::new(format!("{prefix}.id"), "must not be empty"));
        }
        if self.path.is_empty() {
            issues.push(ConfigIssue::new(format!("{prefix}.path"), "must not be empty"));
        }
        if let Some(i) = self.path.iter().position(|p| !p.is_finite()) {
            issues.push(ConfigIssue::new(
                format!("{prefix}.path[{i}]"),
                "coordinates must be finite",
            ));
        }
    }
}

/// MCDM criterion weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub signal: f64,
    pub load: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            signal: 0.6,
            load: 0.4,
        }
    }
}

impl Weights {
    fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        for (name, value) in [("signal", self.signal), ("load", self.load)] {
            if !(0.0..=1.0).contains(&value) {
                issues.push(ConfigIssue::new(
                    format!("policy.weights.{name}"),
                    format!("must be within [0, 1], got {value}"),
                ));
            }
        }
        let sum = self.signal + self.load;
        if !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            issues.push(ConfigIssue::new(
                "policy.weights",
                format!("must sum to 1, got {sum}"),
            ));
        }
    }
}

/// Parameters of one policy run. Fixed for the duration of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Active policy.
    #[serde(default)]
    pub policy: PolicyKind,

    /// SSF: RSSI advantage a candidate must exceed (dB).
    #[serde(default = "default_hysteresis_margin_db")]
    pub hysteresis_margin_db: f64,

    /// LLF: minimum capacity-weighted load gap that justifies a switch.
    #[serde(default = "default_min_load_delta")]
    pub min_load_delta: f64,

    /// MCDM: criterion weights.
    #[serde(default)]
    pub weights: Weights,

    /// MCDM: composite score advantage required to switch.
    #[serde(default = "default_min_score_margin")]
    pub min_score_margin: f64,

    /// Log-distance path-loss exponent.
    #[serde(default = "default_path_loss_exponent")]
    pub path_loss_exponent: f64,

    /// Received power at the 1 m reference distance (dBm).
    #[serde(default = "default_tx_power_dbm")]
    pub tx_power_dbm: f64,

    /// Standard deviation of log-normal shadowing (dB). Zero disables it.
    #[serde(default)]
    pub shadowing_sigma_db: f64,

    /// Seed for the shadowing generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Optional detectability floor (dBm) on top of the range test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rssi_dbm: Option<f64>,
}

fn default_hysteresis_margin_db() -> f64 {
    5.0
}
fn default_min_load_delta() -> f64 {
    1.0
}
fn default_min_score_margin() -> f64 {
    0.05
}
fn default_path_loss_exponent() -> f64 {
    2.0
}
fn default_tx_power_dbm() -> f64 {
    -40.0
}
fn default_seed() -> u64 {
    42
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            hysteresis_margin_db: default_hysteresis_margin_db(),
            min_load_delta: default_min_load_delta(),
            weights: Weights::default(),
            min_score_margin: default_min_score_margin(),
            path_loss_exponent: default_path_loss_exponent(),
            tx_power_dbm: default_tx_power_dbm(),
            shadowing_sigma_db: 0.0,
            seed: default_seed(),
            min_rssi_dbm: None,
        }
    }
}

impl PolicyConfig {
    pub fn new(policy: PolicyKind) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        let non_negative = [
            ("policy.hysteresis_margin_db", self.hysteresis_margin_db),
            ("policy.min_load_delta", self.min_load_delta),
            ("policy.min_score_margin", self.min_score_margin),
            ("policy.shadowing_sigma_db", self.shadowing_sigma_db),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                issues.push(ConfigIssue::new(
                    field,
                    format!("must be a non-negative number, got {value}"),
                ));
            }
        }
        if !(self.path_loss_exponent.is_finite() && self.path_loss_exponent > 0.0) {
            issues.push(ConfigIssue::new(
                "policy.path_loss_exponent",
                format!("must be positive, got {}", self.path_loss_exponent),
            ));
        }
        if !self.tx_power_dbm.is_finite() {
            issues.push(ConfigIssue::new("policy.tx_power_dbm", "must be finite"));
        }
        if let Some(floor) = self.min_rssi_dbm {
            if !floor.is_finite() {
                issues.push(ConfigIssue::new("policy.min_rssi_dbm", "must be finite"));
            }
        }
        self.weights.validate(issues);
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;
    }

    Ok(())
}
