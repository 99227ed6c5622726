//! Failure taxonomy of a deploy or undeploy invocation.
//!
//! Components return these wrapped in [`anyhow::Error`]; `main` renders them and exits with a failure status.
use thiserror::Error;

use crate::{dependencies::ClientError, models::OperationState};

#[derive(Debug, Error)]
pub enum DeployError {
    /// Bad or missing input, detected before any request is made.
    #[error("{0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// A conflicting operation is still active.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Transport(String),

    /// The deployment process itself ended in ERROR or ABORTED.
    #[error("Operation {operation_id} ended in state {state}: {message}")]
    RemoteProcess {
        operation_id: String,
        state: OperationState,
        message: String,
    },

    #[error(
        "Operation {operation_id} is waiting for an action, but the terminal is not interactive"
    )]
    ActionRequiredUnhandled { operation_id: String },

    /// The operator stopped the command, e.g. by refusing a confirmation.
    #[error("{0}")]
    Canceled(String),

    #[error("Monitoring of operation {operation_id} was interrupted")]
    Interrupted { operation_id: String },
}

impl DeployError {
    /// Wrap a client error that occurred while doing `what`.
    pub fn from_client(what: &str, error: ClientError) -> Self {
        match error {
            ClientError::Auth(message) => Self::Auth(format!("{what}: {message}")),
            other => Self::Transport(format!("{what}: {other}")),
        }
    }
}
