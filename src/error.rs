use crate::{interact::InputError, transport::TransportError, validation::ValidationFailure};
use thiserror::Error;

/// Errors that stop a sequence run.
///
/// Skipped nodes and unresolved placeholders are not errors and never show
/// up here.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The configuration was rejected before any node ran.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Collecting a node's prompt answers failed.
    #[error("node '{node_id}': failed to collect user input")]
    Input {
        node_id: String,
        #[source]
        source: InputError,
    },

    /// The request could not be completed (connection, DNS, timeout).
    #[error("node '{node_id}': request failed")]
    Transport {
        node_id: String,
        #[source]
        source: TransportError,
    },

    /// The node ran but its response did not meet a validation rule.
    #[error("node '{node_id}': {failure}")]
    Validation {
        node_id: String,
        failure: ValidationFailure,
    },
}

impl SequenceError {
    /// Id of the node the run stopped at, if it got that far.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            SequenceError::Config(_) => None,
            SequenceError::Input { node_id, .. }
            | SequenceError::Transport { node_id, .. }
            | SequenceError::Validation { node_id, .. } => Some(node_id),
        }
    }
}
