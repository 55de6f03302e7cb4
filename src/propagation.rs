//! Radio Propagation
//!
//! Log-distance path loss and the range test used to decide which access
//! points a station can hear. The model is a pure function of distance; the
//! optional shadowing generator is a separate, explicitly seeded component.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::config::PolicyConfig;

/// Distances below this are clamped to keep `log10` finite.
pub const MIN_DISTANCE_M: f64 = 1.0;

// ============================================================================
// Path Loss
// ============================================================================

/// Received signal strength under the log-distance law.
///
/// `tx_power_dbm` is the power received at the 1 m reference distance, so
/// `rssi(-40.0, d, 2.0) == -40 - 20 * log10(d)`.
pub fn rssi(tx_power_dbm: f64, distance_m: f64, path_loss_exponent: f64) -> f64 {
    let d = distance_m.max(MIN_DISTANCE_M);
    tx_power_dbm - 10.0 * path_loss_exponent * d.log10()
}

/// Propagation parameters of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagationModel {
    pub tx_power_dbm: f64,
    pub path_loss_exponent: f64,
    /// Optional detectability floor applied on top of the range test, to
    /// the RSSI as reported (shadowing included).
    pub min_rssi_dbm: Option<f64>,
}

impl Default for PropagationModel {
    fn default() -> Self {
        Self {
            tx_power_dbm: -40.0,
            path_loss_exponent: 2.0,
            min_rssi_dbm: None,
        }
    }
}

impl PropagationModel {
    pub fn new(tx_power_dbm: f64, path_loss_exponent: f64) -> Self {
        Self {
            tx_power_dbm,
            path_loss_exponent,
            min_rssi_dbm: None,
        }
    }

    pub fn from_policy(config: &PolicyConfig) -> Self {
        Self {
            tx_power_dbm: config.tx_power_dbm,
            path_loss_exponent: config.path_loss_exponent,
            min_rssi_dbm: config.min_rssi_dbm,
        }
    }

    /// RSSI in dBm at `distance_m`.
    pub fn rssi_at(&self, distance_m: f64) -> f64 {
        rssi(self.tx_power_dbm, distance_m, self.path_loss_exponent)
    }

    /// Inclusive range test on the path-loss RSSI: a station exactly at the
    /// range limit is in range.
    pub fn in_range(&self, distance_m: f64, range_m: f64) -> bool {
        self.detectable(distance_m, range_m, self.rssi_at(distance_m))
    }

    /// Range test for an observed `rssi_dbm`, which may include shadowing.
    pub fn detectable(&self, distance_m: f64, range_m: f64, rssi_dbm: f64) -> bool {
        if distance_m > range_m {
            return false;
        }
        self.min_rssi_dbm.map_or(true, |floor| rssi_dbm >= floor)
    }
}

// ============================================================================
// Shadow Fading
// ============================================================================

/// Seeded log-normal shadowing added on top of the path-loss RSSI.
pub struct Shadowing {
    normal: Normal<f64>,
    rng: ChaCha8Rng,
}

impl Shadowing {
    /// Returns `None` when `std_dev_db` is zero (shadowing disabled).
    pub fn new(std_dev_db: f64, seed: u64) -> Option<Self> {
        if std_dev_db <= 0.0 {
            return None;
        }
        let normal = Normal::new(0.0, std_dev_db).ok()?;
        Some(Self {
            normal,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Next shadowing sample in dB.
    pub fn sample(&mut self) -> f64 {
        self.normal.sample(&mut self.rng)
    }
}

impl std::fmt::Debug for Shadowing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shadowing")
            .field("std_dev_db", &self.normal.std_dev())
            .finish_non_exhaustive()
    }
}
