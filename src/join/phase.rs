use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPhase {
    /// Accepting work; at least one continuation outstanding, or nothing registered yet
    Open,
    /// Every continuation settled; finalization armed but not run
    Draining,
    /// First error recorded; finalization armed but not run
    Erroring,
    /// Completion handler ran
    Finalized,
}

impl JoinPhase {
    /// Check if this is a terminal phase (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }

    /// Check if a finalization is armed in this phase
    pub fn is_finalizing(&self) -> bool {
        matches!(self, Self::Draining | Self::Erroring)
    }
}

impl fmt::Display for JoinPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Draining => write!(f, "draining"),
            Self::Erroring => write!(f, "erroring"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

impl std::str::FromStr for JoinPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "draining" => Ok(Self::Draining),
            "erroring" => Ok(Self::Erroring),
            "finalized" => Ok(Self::Finalized),
            _ => Err(format!("Invalid join phase: {s}")),
        }
    }
}

/// Counters collected over the lifetime of a join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    /// Continuations bound to a tree node
    pub registered: u64,
    /// First invocations of those continuations
    pub settled: u64,
    /// Continuations handed out after the first error
    pub inert_registrations: u64,
    /// Invocations ignored because an error was already recorded
    pub dropped_results: u64,
    pub finalizations_armed: u64,
    pub finalizations_canceled: u64,
}
