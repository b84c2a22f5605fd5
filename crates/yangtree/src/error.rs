//! Error taxonomy for data tree operations.

use thiserror::Error;
use yangtree_path::{ExprError, ParseError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Create against an existing unique target.
    #[error("data exists: {0}")]
    DataExists(String),
    /// Delete or update against an absent required target.
    #[error("data missing: {0}")]
    DataMissing(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    #[error("operation not supported: {0}")]
    OperationNotSupported(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

/// Taxonomy tag of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DataExists,
    DataMissing,
    InvalidPath,
    SchemaNotFound,
    OperationNotSupported,
    InvalidValue,
    ValidationFailed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DataExists(_) => ErrorKind::DataExists,
            Error::DataMissing(_) => ErrorKind::DataMissing,
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::SchemaNotFound(_) => ErrorKind::SchemaNotFound,
            Error::OperationNotSupported(_) => ErrorKind::OperationNotSupported,
            Error::InvalidValue(_) => ErrorKind::InvalidValue,
            Error::ValidationFailed(_) => ErrorKind::ValidationFailed,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidPath(err.to_string())
    }
}

impl From<ExprError> for Error {
    fn from(err: ExprError) -> Self {
        Error::InvalidPath(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
