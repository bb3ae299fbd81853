use shared_types::{ReadOutcome, RepoDescriptor, RepoKind, RepoRecord, WriteOutcome, WriteReceipt};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::backends::RepoBackend;
use crate::crypto::Cryptography;
use crate::error::{RepoError, Result};
use crate::Backend;

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Secret used to encrypt the content before it reaches the backend
    pub encrypt: Option<String>,
    /// How long a queued write may wait for its turn. Once started it runs
    /// to completion; unqueued backends bound the whole call instead.
    pub timeout: Option<Duration>,
}

impl WriteOptions {
    pub fn encrypted(secret: impl Into<String>) -> Self {
        Self {
            encrypt: Some(secret.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub decrypt: Option<String>,
}

impl ReadOptions {
    pub fn decrypted(secret: impl Into<String>) -> Self {
        Self {
            decrypt: Some(secret.into()),
        }
    }
}

/// Uniform entry point over any backend.
///
/// Content is encrypted here, before the backend sees it, and decrypted
/// after the backend returns it. Backends only ever handle opaque text.
pub struct Repository {
    backend: RepoBackend,
    crypto: Cryptography,
    id: OnceLock<String>,
}

impl Repository {
    pub fn new(backend: impl Into<RepoBackend>) -> Self {
        Self {
            backend: backend.into(),
            crypto: Cryptography,
            id: OnceLock::new(),
        }
    }

    pub fn backend(&self) -> &RepoBackend {
        &self.backend
    }

    pub fn kind(&self) -> RepoKind {
        self.backend.kind()
    }

    pub async fn sync(&self) -> Result<&Self> {
        self.backend.sync().await?;
        Ok(self)
    }

    #[instrument(skip(self, content, options), fields(kind = %self.kind()))]
    pub async fn write(
        &self,
        path: &str,
        content: &str,
        options: &WriteOptions,
    ) -> Result<WriteReceipt> {
        let payload = self
            .crypto
            .encrypt(content, options.encrypt.as_deref())
            .await?;

        let outcome = match options.timeout {
            Some(timeout) => {
                self.backend
                    .write_file_within(path, payload, timeout)
                    .await
            }
            None => self.backend.write_file(path, payload).await,
        };

        match outcome {
            WriteOutcome::Written(receipt) => {
                debug!("Wrote {}", path);
                Ok(receipt)
            }
            WriteOutcome::Failed { error } => Err(RepoError::Backend {
                path: path.to_string(),
                message: error,
            }),
            WriteOutcome::TimedOut => {
                let timeout = options.timeout.unwrap_or_default();
                warn!("Write to {} abandoned after {:?}", path, timeout);
                Err(RepoError::TimedOut {
                    path: path.to_string(),
                    timeout,
                })
            }
        }
    }

    #[instrument(skip(self, options), fields(kind = %self.kind()))]
    pub async fn read(&self, path: &str, options: &ReadOptions) -> Result<String> {
        match self.backend.read_file(path).await {
            ReadOutcome::Found { content } => Ok(self
                .crypto
                .decrypt(&content, options.decrypt.as_deref())
                .await?),
            ReadOutcome::NotFound => Err(RepoError::NotFound(path.to_string())),
            ReadOutcome::Failed { error } => Err(RepoError::Backend {
                path: path.to_string(),
                message: error,
            }),
        }
    }

    /// Backend identity, computed on first use and then reused.
    pub fn get_id(&self) -> &str {
        self.id.get_or_init(|| self.backend.repo_id())
    }

    pub fn objectify(&self) -> RepoRecord {
        RepoRecord {
            id: self.get_id().to_string(),
            descriptor: self.backend.descriptor(),
        }
    }

    pub async fn matches(&self, descriptor: &RepoDescriptor) -> bool {
        self.backend.matches(descriptor).await
    }

    /// Releases any pooled connection held by the backend.
    pub async fn close(&self) {
        self.backend.close().await;
    }
}
