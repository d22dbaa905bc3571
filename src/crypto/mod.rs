// ABOUTME: Symmetric secret encryption for credentials at rest
// ABOUTME: AES-256-GCM with a random nonce prepended to the ciphertext, base64 encoded
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Secret Codec
//!
//! Encrypts and decrypts provider tokens before they touch storage.
//! Each blob is `base64([12-byte nonce][ciphertext+tag])`; every encryption
//! uses a fresh nonce so identical plaintexts never produce identical blobs.
//!
//! Decryption failure is a distinct, catchable condition ([`CryptoError`]):
//! callers treat it as "credential unusable", never as a crash.

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use thiserror::Error;

/// Environment variable holding the base64-encoded 32-byte secrets key
pub const SECRETS_KEY_ENV: &str = "PRESENCE_SECRETS_KEY";

const NONCE_LEN: usize = 12;

/// Failure while encrypting or decrypting a secret
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secrets key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("secrets key is not valid base64: {0}")]
    InvalidKeyEncoding(String),

    #[error("encryption failed")]
    EncryptFailed,

    /// Wrong key, truncated blob, bad base64 or non-UTF-8 plaintext all
    /// land here; the credential is unusable either way
    #[error("decryption failed: {0}")]
    DecryptFailed(String),
}

/// Stateless encrypt/decrypt pair over a single symmetric key
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material through Debug output
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    #[must_use]
    pub const fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Load the codec key from `PRESENCE_SECRETS_KEY` (base64, 32 bytes)
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset, not valid base64, or the
    /// decoded key is not exactly 32 bytes.
    pub fn from_env() -> Result<Self, CryptoError> {
        let encoded = std::env::var(SECRETS_KEY_ENV)
            .map_err(|_| CryptoError::InvalidKeyEncoding(format!("{SECRETS_KEY_ENV} not set")))?;
        Self::from_base64(&encoded)
    }

    /// Build a codec from a base64-encoded 32-byte key
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the key has the wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Encrypt a plaintext secret into a storable blob
    ///
    /// # Errors
    ///
    /// Returns an error if the AEAD seal operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        use ring::rand::{SecureRandom, SystemRandom};

        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::EncryptFailed)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let unbound_key =
            UnboundKey::new(&AES_256_GCM, &self.key).map_err(|_| CryptoError::EncryptFailed)?;
        let key = LessSafeKey::new(unbound_key);

        let mut data = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut data)
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data);
        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypt a blob produced by [`Self::encrypt`]
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptFailed`] if the blob is malformed or was
    /// encrypted under a different key.
    pub fn decrypt(&self, blob: &str) -> Result<String, CryptoError> {
        let combined = general_purpose::STANDARD
            .decode(blob)
            .map_err(|e| CryptoError::DecryptFailed(format!("invalid base64: {e}")))?;
        if combined.len() < NONCE_LEN {
            return Err(CryptoError::DecryptFailed("blob too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::DecryptFailed("invalid nonce".into()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_array);

        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| CryptoError::DecryptFailed("invalid key".into()))?;
        let key = LessSafeKey::new(unbound_key);

        let mut data = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut data)
            .map_err(|_| CryptoError::DecryptFailed("authentication failed".into()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| CryptoError::DecryptFailed(format!("invalid UTF-8: {e}")))
    }
}

/// Generate a fresh random 32-byte key (bootstrap and tests)
#[must_use]
pub fn generate_key() -> [u8; 32] {
    use rand::RngCore;

    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
