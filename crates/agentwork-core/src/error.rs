//! Error types for agentwork-core.

use thiserror::Error;

use crate::work::WorkStatus;

/// Result type alias for agentwork-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while validating work items.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid status transition.
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidStateTransition { from: WorkStatus, to: WorkStatus },

    /// Session id changed outside of the status change it is coupled to.
    #[error("session id can only be {action} together with a transition to '{required}'")]
    SessionCoupling {
        action: &'static str,
        required: WorkStatus,
    },

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown enum value when parsing user input.
    #[error("unknown {kind}: '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
