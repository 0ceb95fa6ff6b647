//! Error types for the download engine.

use msgsync_crypto::DecryptionError;
use msgsync_model::EntityKind;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a download run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No account id or no decryption key is available.
    #[error("no account credentials available")]
    NoCredential,

    /// A record could not be decrypted.
    #[error("failed to decrypt {kind} record {id}: {source}")]
    Decryption {
        /// Entity type of the record.
        kind: EntityKind,
        /// Record id.
        id: i64,
        /// Underlying failure.
        #[source]
        source: DecryptionError,
    },

    /// Network or remote service failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call could succeed if repeated.
        retryable: bool,
    },

    /// The remote service answered with something we could not decode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Media backend sign-in failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Local store rejected an operation.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Account preferences could not be read or written.
    #[error("preferences error: {0}")]
    Preferences(String),

    /// The run was cancelled before the next step started.
    #[error("download cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a record decrypt failure.
    pub fn decryption(kind: EntityKind, id: i64, source: DecryptionError) -> Self {
        Self::Decryption { kind, id, source }
    }

    /// Returns true if this error could go away on a later run.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Authentication(_) => true,
            _ => false,
        }
    }
}
