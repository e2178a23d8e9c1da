//! # Error Types
//!
//! Contract violations and configuration failures raised by the join
//! coordinator. Operation failures reported by user code never appear here:
//! they travel through the join's own `Result<Vec<T>, E>` channel.

use crate::join::NodeId;

/// Errors surfaced synchronously to the caller that misused the API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// `register` was called on a join whose completion handler already ran
    #[error("join '{join}' reused after completion")]
    ReusedAfterCompletion { join: String },

    /// The same continuation was invoked a second time
    #[error("continuation {node} of join '{join}' called more than once")]
    InvokedMoreThanOnce { join: String, node: NodeId },

    /// Invalid configuration value or unreadable configuration source
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl JoinError {
    /// True for errors caused by misuse of a join instance
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ReusedAfterCompletion { .. } | Self::InvokedMoreThanOnce { .. }
        )
    }
}

impl From<config::ConfigError> for JoinError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JoinError>;
