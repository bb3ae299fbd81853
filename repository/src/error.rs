use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Unknown repo type: {0}")]
    UnknownType(String),

    #[error("Invalid repository descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Backend failure for {path}: {message}")]
    Backend { path: String, message: String },

    #[error("Write to {path} timed out after {timeout:?}")]
    TimedOut { path: String, timeout: Duration },

    #[error("Repository sync failed: {0}")]
    Sync(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Decryption failed: wrong secret or corrupted data")]
    Decrypt,

    #[error("Crypto worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;
