//! Error types for msgsync crypto.

use thiserror::Error;

/// Result type for key and cipher setup.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised while building keys or encrypting.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material had the wrong length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Actual length.
        actual: usize,
        /// Expected length.
        expected: usize,
    },

    /// Key text was not valid base64.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// A single ciphertext could not be turned back into plaintext.
///
/// Raised for malformed or corrupted input; the record it came from must not
/// be trusted beyond its id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptionError {
    /// The text envelope was not valid base64.
    #[error("ciphertext is not valid base64: {0}")]
    Encoding(String),

    /// The envelope is shorter than nonce + tag.
    #[error("ciphertext too short: {len} bytes")]
    Truncated {
        /// Envelope length.
        len: usize,
    },

    /// Authentication tag mismatch (wrong key or corrupted bytes).
    #[error("authentication failed")]
    Authentication,

    /// Decrypted text field was not UTF-8.
    #[error("plaintext is not valid UTF-8")]
    Utf8,
}
