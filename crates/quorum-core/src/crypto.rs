use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

pub const KEY_ENV: &str = "QUORUM_ENCRYPTION_KEY";

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),
    #[error("Decryption failed: {0}")]
    Decrypt(String),
    #[error("Key management error: {0}")]
    KeyManagement(String),
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// AES-256-GCM cipher for stored API keys.
///
/// Stored form is `base64(nonce):base64(ciphertext)`, one fresh nonce per value.
#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(..)")
    }
}

impl CredentialCipher {
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::KeyManagement(format!("key is not hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(CryptoError::KeyManagement(format!(
                "key has wrong length: {} bytes (expected 32)",
                bytes.len()
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Throwaway key; values encrypted with it do not survive the process.
    pub fn random() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Key from `QUORUM_ENCRYPTION_KEY`. On-disk stores must always reopen
    /// with the same key, so a missing variable is an error.
    pub fn from_env() -> Result<Self, CryptoError> {
        Self::from_env_value(std::env::var(KEY_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Result<Self, CryptoError> {
        match value {
            Some(v) if !v.trim().is_empty() => Self::from_hex(v),
            _ => Err(CryptoError::KeyManagement(format!(
                "{} is not set (64 hex characters required)",
                KEY_ENV
            ))),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        Ok(format!("{}:{}", B64.encode(nonce_bytes), B64.encode(ciphertext)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let (nonce_b64, ct_b64) = stored
            .split_once(':')
            .ok_or_else(|| CryptoError::Decrypt("missing nonce separator".into()))?;

        let nonce_bytes = B64.decode(nonce_b64)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Decrypt(format!(
                "Invalid nonce length: {} (expected {})",
                nonce_bytes.len(),
                NONCE_LEN
            )));
        }
        let ciphertext = B64.decode(ct_b64)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::Decrypt(format!("Invalid UTF-8 in decrypted data: {}", e)))
    }
}
