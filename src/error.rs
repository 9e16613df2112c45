//! Crate-level error types

use thiserror::Error;

use crate::protocol::message::ErrorKind;
use crate::registry::TrackerError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// The server answered a request with an `error` frame
    #[error("Rejected by server ({kind}): {message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Operation timed out")]
    Timeout,
}

/// Wire-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),
}
