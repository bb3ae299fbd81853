mod fs;
mod github;
mod mongo;
mod remote;

use async_trait::async_trait;
use shared_types::{ReadOutcome, RepoDescriptor, RepoKind, WriteOutcome};
use std::time::Duration;

pub use fs::FsRepo;
pub use github::{GithubRepo, DEFAULT_API_URL};
pub use mongo::MongoRepo;
pub use remote::RemoteRepo;

use crate::error::Result;
use crate::Backend;

/// The closed set of backends a repository can sit on
pub enum RepoBackend {
    Fs(FsRepo),
    Github(GithubRepo),
    Mongo(MongoRepo),
    Remote(RemoteRepo),
}

impl RepoBackend {
    /// Releases pooled connections. Only the document store holds any.
    pub async fn close(&self) {
        if let Self::Mongo(mongo) = self {
            mongo.close().await;
        }
    }
}

#[async_trait]
impl Backend for RepoBackend {
    fn kind(&self) -> RepoKind {
        match self {
            Self::Fs(backend) => backend.kind(),
            Self::Github(backend) => backend.kind(),
            Self::Mongo(backend) => backend.kind(),
            Self::Remote(backend) => backend.kind(),
        }
    }

    async fn sync(&self) -> Result<()> {
        match self {
            Self::Fs(backend) => backend.sync().await,
            Self::Github(backend) => backend.sync().await,
            Self::Mongo(backend) => backend.sync().await,
            Self::Remote(backend) => backend.sync().await,
        }
    }

    async fn read_file(&self, path: &str) -> ReadOutcome {
        match self {
            Self::Fs(backend) => backend.read_file(path).await,
            Self::Github(backend) => backend.read_file(path).await,
            Self::Mongo(backend) => backend.read_file(path).await,
            Self::Remote(backend) => backend.read_file(path).await,
        }
    }

    async fn write_file(&self, path: &str, content: String) -> WriteOutcome {
        match self {
            Self::Fs(backend) => backend.write_file(path, content).await,
            Self::Github(backend) => backend.write_file(path, content).await,
            Self::Mongo(backend) => backend.write_file(path, content).await,
            Self::Remote(backend) => backend.write_file(path, content).await,
        }
    }

    async fn write_file_within(
        &self,
        path: &str,
        content: String,
        timeout: Duration,
    ) -> WriteOutcome {
        match self {
            Self::Fs(backend) => backend.write_file_within(path, content, timeout).await,
            Self::Github(backend) => backend.write_file_within(path, content, timeout).await,
            Self::Mongo(backend) => backend.write_file_within(path, content, timeout).await,
            Self::Remote(backend) => backend.write_file_within(path, content, timeout).await,
        }
    }

    fn repo_id(&self) -> String {
        match self {
            Self::Fs(backend) => backend.repo_id(),
            Self::Github(backend) => backend.repo_id(),
            Self::Mongo(backend) => backend.repo_id(),
            Self::Remote(backend) => backend.repo_id(),
        }
    }

    fn descriptor(&self) -> RepoDescriptor {
        match self {
            Self::Fs(backend) => backend.descriptor(),
            Self::Github(backend) => backend.descriptor(),
            Self::Mongo(backend) => backend.descriptor(),
            Self::Remote(backend) => backend.descriptor(),
        }
    }

    async fn matches(&self, descriptor: &RepoDescriptor) -> bool {
        match self {
            Self::Fs(backend) => backend.matches(descriptor).await,
            Self::Github(backend) => backend.matches(descriptor).await,
            Self::Mongo(backend) => backend.matches(descriptor).await,
            Self::Remote(backend) => backend.matches(descriptor).await,
        }
    }
}

impl From<FsRepo> for RepoBackend {
    fn from(backend: FsRepo) -> Self {
        Self::Fs(backend)
    }
}

impl From<GithubRepo> for RepoBackend {
    fn from(backend: GithubRepo) -> Self {
        Self::Github(backend)
    }
}

impl From<MongoRepo> for RepoBackend {
    fn from(backend: MongoRepo) -> Self {
        Self::Mongo(backend)
    }
}

impl From<RemoteRepo> for RepoBackend {
    fn from(backend: RemoteRepo) -> Self {
        Self::Remote(backend)
    }
}
