//! Error types for the handover engine.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::types::{ApId, StationId};

/// Result type alias for handover operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("invalid configuration: {}", IssueList(.0))]
    Configuration(Vec<ConfigIssue>),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    // Registry errors
    #[error("access point {0} not found")]
    NotFound(ApId),

    // Logic defects
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    // Logging setup
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

/// A single invalid configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path of the offending field, e.g. `access_points[ap1].range_m`.
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

struct IssueList<'a>(&'a [ConfigIssue]);

impl fmt::Display for IssueList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Broken decision/registry coupling. Always fatal for the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("load of {ap} would go negative")]
    NegativeLoad { ap: ApId },

    #[error("decision references unknown access point {0}")]
    UnknownAccessPoint(ApId),

    #[error("load of {ap} is {recorded} but {observed} stations are associated")]
    LoadMismatch {
        ap: ApId,
        recorded: u32,
        observed: u32,
    },

    #[error("{station} associated with out-of-range {ap} at tick {tick}")]
    OutOfRangeAssociation {
        station: StationId,
        ap: ApId,
        tick: usize,
    },

    #[error("{station} asked to switch to {ap}: {reason}")]
    StaleDecision {
        station: StationId,
        ap: ApId,
        reason: &'static str,
    },
}

impl Error {
    /// Invariant violations abort the run; everything else is caller input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }

    /// Lookups performed by a strategy must never miss. Converts a
    /// registry miss into the corresponding invariant violation.
    pub fn into_invariant(self) -> Self {
        match self {
            Error::NotFound(ap) => Error::Invariant(InvariantViolation::UnknownAccessPoint(ap)),
            other => other,
        }
    }

    /// Configuration issues carried by this error, if any.
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            Error::Configuration(issues) => issues,
            _ => &[],
        }
    }
}
