//! AES-256-GCM sealing for refresh tokens stored in the user table.
//!
//! A sealed value is `base64(nonce) + "." + base64(ciphertext)`, so nonce and
//! ciphertext live in one column. Each seal draws a fresh random nonce.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// 256-bit key
const KEY_SIZE: usize = 32;

/// 96-bit GCM nonce
const NONCE_SIZE: usize = 12;

/// Holds the master key for the user store.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_base64: &str) -> Result<Self> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .context("Failed to decode base64 encryption key")?;

        if key_bytes.len() != KEY_SIZE {
            return Err(anyhow!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key_bytes.len()
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        Ok(format!("{}.{}", BASE64.encode(nonce), BASE64.encode(ciphertext)))
    }

    pub fn open(&self, sealed: &str) -> Result<String> {
        let (nonce_b64, ciphertext_b64) = sealed
            .split_once('.')
            .ok_or_else(|| anyhow!("Sealed value is missing the nonce separator"))?;

        let nonce_bytes = BASE64.decode(nonce_b64).context("Failed to decode nonce")?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(anyhow!(
                "Invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            ));
        }
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .context("Failed to decode ciphertext")?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| anyhow!("Decryption failed (wrong key or corrupted data)"))?;

        String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
    }
}
