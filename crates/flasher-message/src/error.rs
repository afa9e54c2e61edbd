//! Error types for flasher-message.

use thiserror::Error;

/// Errors that can occur while decoding a radio payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is truncated or structurally invalid.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl DecodeError {
    /// Create a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        DecodeError::Malformed(message.into())
    }
}

/// Result type alias for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
