// Data Encryption Module
// Seals small payloads (credential cookies) with AES-256-GCM

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use argon2::Argon2;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

const NONCE_LEN: usize = 12;

/// Encryption-related errors
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,

    #[error("Base64 encoding error: {0}")]
    Base64Error(String),
}

/// Data encryption service using AES-256-GCM.
///
/// Sealed values are `base64url(nonce || ciphertext)` so they fit in a single
/// cookie value. Callers bind each value to its context through associated
/// data; a value sealed for one context fails to open in another.
pub struct DataEncryption {
    cipher: Aes256Gcm,
}

impl DataEncryption {
    /// Create a new data encryption service with a master key
    pub fn new(master_key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(master_key.into()),
        }
    }

    /// Create from a password using Argon2 key derivation
    pub fn from_password(password: &str, salt: &[u8]) -> Result<Self, EncryptionError> {
        let mut key = [0u8; 32];

        Argon2::default()
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| EncryptionError::KeyDerivationFailed(e.to_string()))?;

        Ok(Self::new(&key))
    }

    /// Encrypt `plaintext`, authenticating `aad` alongside it.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, EncryptionError> {
        // Generate random nonce (96 bits / 12 bytes for AES-GCM)
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Reverse of [`DataEncryption::seal`]. Fails on tampering, a wrong key,
    /// or mismatched associated data.
    pub fn open(&self, sealed: &str, aad: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let raw = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|e| EncryptionError::Base64Error(e.to_string()))?;

        // Nonce plus at least the 16-byte tag
        if raw.len() < NONCE_LEN + 16 {
            return Err(EncryptionError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for DataEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataEncryption([REDACTED])")
    }
}
