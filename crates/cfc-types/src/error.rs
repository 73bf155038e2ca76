use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid project path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid module coordinates {coordinates:?}: expected group:name:version")]
    InvalidCoordinates { coordinates: String },

    #[error("unknown state type tag: {0}")]
    UnknownStateType(u8),
}
