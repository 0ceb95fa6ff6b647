//! # msgsync Crypto
//!
//! Account key handling and record decryption for msgsync.
//!
//! This crate provides:
//! - `EncryptionKey`, the account's symmetric key (zeroized on drop)
//! - The `Decryptor` trait consumed by the download engine
//! - `AesCipher`, an AES-256-GCM implementation of `Decryptor`
//!
//! ## Envelope
//!
//! Binary payloads (media blobs) are `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! Text fields carry the same envelope, base64-encoded.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;
mod key;

pub use cipher::{AesCipher, Decryptor, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult, DecryptionError};
pub use key::{EncryptionKey, KEY_SIZE};
