//! Error types for the transparency client core.

use thiserror::Error;

/// Input and format errors raised by the core primitives.
///
/// None of these are transient: retrying the same input yields the same error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

impl CoreError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CoreError::MalformedInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
