//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding collaborator input.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A cursor token could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A field argument has the wrong shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
