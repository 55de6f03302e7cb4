//! # Handover
//!
//! Handover decision engine for mobile stations roaming between Wi-Fi access
//! points.
//!
//! Each tick, every station moves along its path, measures every access
//! point through a log-distance propagation model, and a pluggable policy
//! decides whether it stays, switches, or drops off. Confirmed switches are
//! committed to a shared registry of per-AP loads, so later decisions in the
//! same tick see them.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Simulation Engine (tick loop)                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Mobility Driver  →  Propagation Model  →  Measurement Snapshot │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                        Handover Policy                          │
//! │     ┌──────────┐        ┌──────────┐        ┌──────────┐        │
//! │     │   SSF    │        │   LLF    │        │   MCDM   │        │
//! │     └──────────┘        └──────────┘        └──────────┘        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │       AP Registry (loads)     │     Metrics Collector / Report  │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]       // Acceptable for stats
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::similar_names)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod engine;
pub mod error;
pub mod measurement;
pub mod metrics;
pub mod mobility;
pub mod policy;
pub mod propagation;
pub mod registry;
pub mod report;
pub mod scenarios;
pub mod types;

pub use config::ScenarioConfig;
pub use engine::{run, Simulation};
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AccessPointConfig, PolicyConfig, ScenarioConfig, StationConfig, Weights};
    pub use crate::engine::{AssociationController, Simulation};
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{HandoverEvent, RunResult, RunSummary, TickRecord};
    pub use crate::mobility::Path;
    pub use crate::policy::{AssociationState, Decision, HandoverPolicy};
    pub use crate::registry::ApRegistry;
    pub use crate::report::Comparison;
    pub use crate::types::*;
}
