#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod backends;
pub mod config;
pub mod crypto;
pub mod error;
pub mod factory;
pub mod queue;
pub mod repository;


use async_trait::async_trait;
use shared_types::{ReadOutcome, RepoDescriptor, RepoKind, WriteOutcome};
use std::time::Duration;

pub use backends::{FsRepo, GithubRepo, MongoRepo, RemoteRepo, RepoBackend};
pub use config::QueueConfig;
pub use crypto::Cryptography;
pub use error::{CryptoError, RepoError, Result};
pub use factory::Repos;
pub use repository::{ReadOptions, Repository, WriteOptions};

/// Capability every storage backend provides to the [`Repository`] contract.
///
/// `read_file` and `write_file` never fail across this boundary: every error
/// is folded into the returned outcome.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> RepoKind;

    /// Backend-specific readiness step. Must be idempotent.
    async fn sync(&self) -> Result<()> {
        Ok(())
    }

    async fn read_file(&self, path: &str) -> ReadOutcome;

    async fn write_file(&self, path: &str, content: String) -> WriteOutcome;

    /// `write_file` bounded by `timeout`, answering [`WriteOutcome::TimedOut`]
    /// when the bound is hit. Queued backends only bound the wait in line;
    /// unqueued ones bound the whole call.
    async fn write_file_within(
        &self,
        path: &str,
        content: String,
        timeout: Duration,
    ) -> WriteOutcome {
        tokio::time::timeout(timeout, self.write_file(path, content))
            .await
            .unwrap_or(WriteOutcome::TimedOut)
    }

    /// Deterministic identity derived from connection parameters only.
    fn repo_id(&self) -> String;

    /// Descriptor able to rebuild an equivalent backend.
    fn descriptor(&self) -> RepoDescriptor;

    /// Ownership check against another descriptor; no backend claims one yet.
    async fn matches(&self, _descriptor: &RepoDescriptor) -> bool {
        false
    }
}
