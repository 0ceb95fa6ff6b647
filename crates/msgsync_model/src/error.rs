//! Error types for the record model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while interpreting record contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Message data is not a media placeholder.
    #[error("not a media placeholder: {0:?}")]
    NotPlaceholder(String),

    /// Placeholder sequence is not an integer.
    #[error("invalid placeholder sequence in {0:?}")]
    InvalidSequence(String),
}
