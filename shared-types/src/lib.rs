#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Branch used by versioned repositories when the descriptor names none.
pub const DEFAULT_BRANCH: &str = "main";

/// Tag identifying which backend a repository talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Fs,
    Github,
    Mongo,
    Remote,
}

impl RepoKind {
    pub const ALL: [RepoKind; 4] = [Self::Fs, Self::Github, Self::Mongo, Self::Remote];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fs => "fs",
            Self::Github => "github",
            Self::Mongo => "mongo",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsOptions {
    pub base_dir: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubOptions {
    /// Personal access token sent as a bearer credential
    pub key: String,
    pub username: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// API host override, e.g. an enterprise install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoOptions {
    pub db_url: String,
    pub db_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOptions {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Declarative description of a repository, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepoDescriptor {
    Fs(FsOptions),
    Github(GithubOptions),
    Mongo(MongoOptions),
    Remote(RemoteOptions),
}

impl RepoDescriptor {
    pub fn kind(&self) -> RepoKind {
        match self {
            Self::Fs(_) => RepoKind::Fs,
            Self::Github(_) => RepoKind::Github,
            Self::Mongo(_) => RepoKind::Mongo,
            Self::Remote(_) => RepoKind::Remote,
        }
    }
}

/// Serialized form of a live repository: its descriptor plus the stable id.
///
/// The JSON shape is flat, `{"type": .., "_id": .., ..fields}`, and can be
/// fed back to the factory to rebuild an equivalent repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub descriptor: RepoDescriptor,
}

/// Result of a backend-level write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub path: String,
    /// New version token, for backends that track one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// Raw payload returned by the remote, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl WriteReceipt {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sha: None,
            response: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    Written(WriteReceipt),
    Failed { error: String },
    /// Given up before it started; the remote was never touched
    TimedOut,
}

impl WriteOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Result of a backend-level read. Absence and failure are kept apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadOutcome {
    Found { content: String },
    NotFound,
    Failed { error: String },
}

impl ReadOutcome {
    pub fn found(content: impl Into<String>) -> Self {
        Self::Found {
            content: content.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Operations of the generic remote-repo protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMethod {
    Read,
    Write,
}

impl RemoteMethod {
    /// Path segment under `/remote-repo/`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Body of `POST {base}/remote-repo/{method}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Response envelope of the remote-repo protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
