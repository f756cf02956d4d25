use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Type not supported: {0}")]
    TypeNotSupported(String),

    #[error("Type is not fully specified: {0}")]
    TypeNotFullySpecified(String),

    #[error("Invalid type name '{type_name}': {reason}")]
    InvalidTypeName { type_name: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Overflow: {0}")]
    Overflow(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    pub(crate) fn invalid_type_name(
        type_name: &str,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidTypeName {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn type_mismatch(
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch { expected: expected.into(), actual: actual.into() }
    }

    pub(crate) fn out_of_bounds(index: usize, len: usize) -> Self {
        Error::InvalidArgument(format!(
            "Row index {} out of bounds (row count {})",
            index, len
        ))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
