//! Symmetric encryption for entry content.
//!
//! Content is sealed with AES-256-GCM under a key derived from the caller's
//! secret with Argon2id. The salt is fixed so that a secret always maps to the
//! same key; every call draws a fresh nonce, so two encryptions of the same
//! plaintext never produce the same output. The encoded form is
//! `base64(nonce):base64(ciphertext)`.
//!
//! An empty secret turns both directions into the identity function.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::CryptoError;

const KDF_SALT: &[u8] = b"repository.content-key.v1";
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const SEPARATOR: char = ':';

/// Encrypts `plaintext` with a key derived from `secret`.
pub fn encrypt(plaintext: &str, secret: &str) -> Result<String, CryptoError> {
    if secret.is_empty() {
        return Ok(plaintext.to_string());
    }

    let key = derive_key(secret)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Encrypt)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| CryptoError::Encrypt)?;

    Ok(format!(
        "{}{SEPARATOR}{}",
        general_purpose::STANDARD.encode(nonce_bytes),
        general_purpose::STANDARD.encode(ciphertext)
    ))
}

/// Reverses [`encrypt`]. Fails with [`CryptoError::Decrypt`] when `secret`
/// is not the one the content was sealed with.
pub fn decrypt(encoded: &str, secret: &str) -> Result<String, CryptoError> {
    if secret.is_empty() {
        return Ok(encoded.to_string());
    }

    let (nonce_b64, data_b64) = encoded
        .split_once(SEPARATOR)
        .ok_or_else(|| CryptoError::Malformed("missing nonce separator".to_string()))?;

    let nonce_bytes = general_purpose::STANDARD
        .decode(nonce_b64)
        .map_err(|e| CryptoError::Malformed(format!("nonce is not base64: {e}")))?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CryptoError::Malformed(format!(
            "nonce is {} bytes, expected {NONCE_SIZE}",
            nonce_bytes.len()
        )));
    }

    let ciphertext = general_purpose::STANDARD
        .decode(data_b64)
        .map_err(|e| CryptoError::Malformed(format!("ciphertext is not base64: {e}")))?;

    let key = derive_key(secret)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Decrypt)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| CryptoError::Decrypt)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Malformed("plaintext is not utf-8".to_string()))
}

/// Lowercase hex SHA-256 of `data`.
pub fn hash(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

fn derive_key(secret: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
    let mut key = [0u8; KEY_SIZE];
    argon2::Argon2::default()
        .hash_password_into(secret.as_bytes(), KDF_SALT, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    debug!("Derived {} byte content key", KEY_SIZE);
    Ok(key)
}

/// Stateless encryption capability held by a repository.
///
/// Key derivation is deliberately slow, so the async methods move it onto the
/// blocking pool instead of stalling the runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cryptography;

impl Cryptography {
    pub async fn encrypt(&self, data: &str, secret: Option<&str>) -> Result<String, CryptoError> {
        match secret {
            Some(secret) if !secret.is_empty() => {
                let (data, secret) = (data.to_string(), secret.to_string());
                tokio::task::spawn_blocking(move || encrypt(&data, &secret))
                    .await
                    .map_err(|e| CryptoError::Worker(e.to_string()))?
            }
            _ => Ok(data.to_string()),
        }
    }

    pub async fn decrypt(&self, data: &str, secret: Option<&str>) -> Result<String, CryptoError> {
        match secret {
            Some(secret) if !secret.is_empty() => {
                let (data, secret) = (data.to_string(), secret.to_string());
                tokio::task::spawn_blocking(move || decrypt(&data, &secret))
                    .await
                    .map_err(|e| CryptoError::Worker(e.to_string()))?
            }
            _ => Ok(data.to_string()),
        }
    }
}
