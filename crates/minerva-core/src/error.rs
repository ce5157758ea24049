//! Core error types.

use thiserror::Error;

/// Boxed error raised by an executor's storage layer.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Query core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity is not registered.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Pagination requested on an entity without a primary key.
    #[error("entity {0} has no primary key and cannot be paginated")]
    MissingPrimaryKey(String),

    /// Both `first` and `last` were supplied.
    #[error("first and last cannot be combined")]
    ConflictingPageBounds,

    /// Join nesting exceeded the configured bound.
    #[error("join depth {depth} exceeds maximum {max}")]
    DepthExceeded {
        /// Depth that was reached.
        depth: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Argument could not be interpreted for its field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Registry definitions are inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Operation not supported by the target dialect or executor.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] minerva_proto::Error),

    /// Storage layer error, passed through unchanged.
    #[error(transparent)]
    Storage(StorageError),
}

impl Error {
    /// Wrap a storage-layer error.
    pub fn storage(err: impl Into<StorageError>) -> Self {
        Error::Storage(err.into())
    }

    /// Check if the error is a request or configuration error raised before any
    /// storage call.
    pub fn is_request_error(&self) -> bool {
        !matches!(self, Error::Storage(_))
    }
}
