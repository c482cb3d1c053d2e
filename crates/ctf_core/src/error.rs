//! Error types for the capture-the-flag core.

use thiserror::Error;

use crate::agent::AgentId;

/// Result type alias using [`CtfError`].
pub type Result<T> = std::result::Result<T, CtfError>;

/// Top-level error type for all core errors.
#[derive(Debug, Error, PartialEq)]
pub enum CtfError {
    /// The scenario configuration was rejected at setup.
    #[error("Invalid scenario configuration: {0}")]
    InvalidConfig(String),

    /// No agent with this identifier is registered.
    #[error("Unknown agent ID: {0}")]
    UnknownAgent(AgentId),

    /// The policy supplied no action for an agent this tick.
    #[error("No action supplied for agent {0}")]
    MissingAction(AgentId),

    /// A discrete action index outside `{0, 1, 2}`.
    #[error("Invalid {channel} action index {value} (expected 0, 1 or 2)")]
    InvalidAction {
        /// Which action channel was out of range.
        channel: &'static str,
        /// The offending index.
        value: u8,
    },

    /// Match or agent state disagree with each other. Not recoverable.
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    /// Serialization of a replay or snapshot failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
