//! Failure taxonomy for a dispatch run.

use std::time::Duration;

use thiserror::Error;

/// Why a run ended in the `Failed` terminal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// Prompt too long, or not about sound design.
    #[error("unprocessable request: {0}")]
    UnprocessableRequest(String),

    /// The router kept returning an unknown machine or a track outside 1-16.
    #[error("routing failed: {0}")]
    Routing(String),

    /// Every generation attempt produced output that broke the wire contract.
    #[error("model output still invalid after {attempts} attempts: {last}")]
    ValidationExhausted { attempts: u32, last: String },

    /// A collaborator call ran past its deadline.
    #[error("{stage} timed out after {}ms", after.as_millis())]
    Timeout { stage: &'static str, after: Duration },

    /// The run used up its collaborator call budget.
    #[error("usage limit exceeded: more than {limit} model requests")]
    UsageLimitExceeded { limit: u32 },

    /// The caller went away before the run finished.
    #[error("request cancelled")]
    Cancelled,

    /// Anything unexpected from a collaborator.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl DispatchError {
    /// HTTP status this failure maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::UnprocessableRequest(_)
            | DispatchError::Routing(_)
            | DispatchError::ValidationExhausted { .. } => 422,
            DispatchError::UsageLimitExceeded { .. } => 429,
            DispatchError::Timeout { .. } => 503,
            // nginx's "client closed request"; nobody is listening anyway
            DispatchError::Cancelled => 499,
            DispatchError::Collaborator(_) => 500,
        }
    }
}

/// Failure reported by a collaborator implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The reply arrived but could not be understood.
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// Usage store failure. Logged by the pipeline, never returned to callers.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("usage store: {0}")]
    Store(String),

    #[error("usage task failed: {0}")]
    Join(String),
}
