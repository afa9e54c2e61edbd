//! Error types for the bridge protocol.

use thiserror::Error;

/// Why a request line was rejected before reaching the radio.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The first token is not a known command.
    #[error("{input}: unrecognized command")]
    UnknownCommand {
        /// The request as received, trimmed.
        input: String,
    },

    /// An argument is not a non-negative decimal integer.
    #[error("{input}: invalid argument '{token}'")]
    InvalidArgument {
        /// The request as received, trimmed.
        input: String,
        /// The offending token.
        token: String,
    },
}

/// A client sent more than a line's worth of bytes without a terminator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("buffer overflow: max {max} bytes, got {actual}")]
pub struct LineOverflow {
    /// Longest accepted line.
    pub max: usize,
    /// Bytes buffered when the limit was hit.
    pub actual: usize,
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
