//! Exit flow errors.

use thiserror::Error;

use super::attempt::ExitFlowResult;

/// Errors from the exit state machine.
#[derive(Debug, Clone, Error)]
pub enum ExitError {
    /// The intent cannot be executed.
    #[error("Invalid exit intent {intent_id}: {reason}")]
    InvalidIntent {
        /// Intent ID.
        intent_id: String,
        /// What is wrong.
        reason: String,
    },

    /// The market order at the end of the ladder was refused.
    #[error("Force exit failed for {}: {reason}", .result.intent_id)]
    ForceExitFailed {
        /// Broker error text.
        reason: String,
        /// Attempt trail up to and including the failed force exit.
        result: Box<ExitFlowResult>,
    },
}

impl ExitError {
    /// Attempt trail, when one exists.
    #[must_use]
    pub fn result(&self) -> Option<&ExitFlowResult> {
        match self {
            Self::InvalidIntent { .. } => None,
            Self::ForceExitFailed { result, .. } => Some(result),
        }
    }
}
