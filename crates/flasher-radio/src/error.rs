//! Error types for the radio session.

use thiserror::Error;

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Create a transport error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        TransportError(message.into())
    }
}

/// Errors surfaced by a radio session.
///
/// Timeouts, undecodable packets and unknown tags are not errors; they
/// resolve to synthetic messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The transceiver could not send at all.
    #[error("failed to transmit: {0}")]
    Transmit(#[from] TransportError),

    /// The radio worker is no longer running.
    #[error("radio worker stopped")]
    WorkerStopped,
}

/// Result type alias for radio operations.
pub type RadioResult<T> = Result<T, RadioError>;
