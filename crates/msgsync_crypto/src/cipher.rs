//! Record decryption.

use crate::error::{CryptoError, CryptoResult, DecryptionError};
use crate::key::EncryptionKey;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Turns account ciphertext back into plaintext.
///
/// Implementations must be safe to share across the download thread and the
/// media phase.
pub trait Decryptor: Send + Sync {
    /// Decrypts a binary envelope.
    fn decrypt_bytes(&self, envelope: &[u8]) -> Result<Vec<u8>, DecryptionError>;

    /// Decrypts a base64 text field.
    fn decrypt(&self, text: &str) -> Result<String, DecryptionError> {
        let envelope = STANDARD
            .decode(text)
            .map_err(|e| DecryptionError::Encoding(e.to_string()))?;
        let plain = self.decrypt_bytes(&envelope)?;
        String::from_utf8(plain).map_err(|_| DecryptionError::Utf8)
    }
}

/// AES-256-GCM cipher bound to one account key.
pub struct AesCipher {
    cipher: Aes256Gcm,
}

impl AesCipher {
    /// Creates a cipher for the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypts bytes into `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed("aead encrypt".into()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Encrypts a text field into its base64 envelope.
    pub fn encrypt_text(&self, plaintext: &str) -> CryptoResult<String> {
        self.encrypt(plaintext.as_bytes())
            .map(|envelope| STANDARD.encode(envelope))
    }
}

impl Decryptor for AesCipher {
    fn decrypt_bytes(&self, envelope: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        if envelope.len() < NONCE_SIZE + TAG_SIZE {
            return Err(DecryptionError::Truncated {
                len: envelope.len(),
            });
        }

        let nonce = Nonce::from_slice(&envelope[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &envelope[NONCE_SIZE..])
            .map_err(|_| DecryptionError::Authentication)
    }
}

impl std::fmt::Debug for AesCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCipher").finish_non_exhaustive()
    }
}
