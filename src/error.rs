//! Failure taxonomy for a finalized command.
//!
//! Anything that reaches the controller's finalize boundary as an error is
//! fatal to that one command only: it is reported and the session resets.

use thiserror::Error;

/// Result alias for tracker-facing operations.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Errors that abort creation of a single command's record.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required field was never spoken
    #[error("{0} is required but not provided")]
    MissingRequiredField(String),

    /// A required field was spoken but the tracker does not know it
    #[error("invalid {field}: {value}. {hint}")]
    UnresolvableRequiredField {
        field: String,
        value: String,
        hint: String,
    },

    /// Network failure talking to the tracker
    #[error("tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The tracker answered but reported errors or refused the record
    #[error("tracker error: {0}")]
    Api(String),

    /// The tracker answered with a body we could not decode
    #[error("unexpected tracker response: {0}")]
    Decode(#[from] serde_json::Error),
}
