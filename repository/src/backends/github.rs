//! Repository over the GitHub contents API.
//!
//! Writes are optimistic: the current blob sha of the target path is fetched
//! and sent along with the new content. A conflict answer (409, or 422 when a
//! sha was expected) triggers one re-fetch and one resubmission after a fixed
//! backoff; a second conflict is final. All writes and deletes of one
//! repository go through its [`WriteQueue`], so only one of them is in flight
//! and consecutive ones are spaced by the configured delay.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures::FutureExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use shared_types::{
    GithubOptions, ReadOutcome, RepoDescriptor, RepoKind, WriteOutcome, WriteReceipt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::QueueConfig;
use crate::error::{RepoError, Result};
use crate::queue::{WriteJob, WriteQueue};
use crate::Backend;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct GithubRepo {
    options: GithubOptions,
    api: Arc<ContentsApi>,
    queue: WriteQueue,
}

impl GithubRepo {
    pub fn new(options: GithubOptions) -> Result<Self> {
        Self::with_config(options, QueueConfig::default())
    }

    pub fn with_config(options: GithubOptions, config: QueueConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        let raw = options.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| RepoError::InvalidDescriptor(format!("invalid api_url: {raw}")))?;

        let api = ContentsApi {
            client,
            base_url,
            owner: options.username.clone(),
            repo: options.repo.clone(),
            branch: options.branch.clone(),
            token: options.key.clone(),
            conflict_backoff: config.conflict_backoff,
        };

        Ok(Self {
            options,
            api: Arc::new(api),
            queue: WriteQueue::new(config.write_delay),
        })
    }

    pub fn options(&self) -> &GithubOptions {
        &self.options
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url.as_str().trim_end_matches('/')
    }

    /// Whether `path` currently exists on the configured branch.
    pub async fn file_exists(&self, path: &str) -> bool {
        matches!(self.api.get_entry(path).await, Ok(Some(_)))
    }

    fn put_job(&self, path: &str, content: String) -> (String, WriteJob) {
        let api = Arc::clone(&self.api);
        let path = path.to_string();
        let label = format!("write {path}");

        let job = async move {
            match api.put_contents(&path, &content).await {
                Ok(receipt) => {
                    info!("Wrote {} (sha {:?})", path, receipt.sha);
                    WriteOutcome::Written(receipt)
                }
                Err(e) => {
                    warn!("Write to {} failed: {:#}", path, e);
                    WriteOutcome::failed(format!("{e:#}"))
                }
            }
        };

        (label, job.boxed())
    }

    /// Deletes `path`, conditioned on its current sha. Queued like a write.
    #[instrument(skip(self), fields(repo = %self.repo_id()))]
    pub async fn delete_file(&self, path: &str, message: Option<&str>) -> WriteOutcome {
        let api = Arc::clone(&self.api);
        let path = path.to_string();
        let message = message.map_or_else(|| format!("Delete {path}"), str::to_string);
        let label = format!("delete {path}");

        let job = async move {
            match api.delete_contents(&path, &message).await {
                Ok(receipt) => {
                    info!("Deleted {}", path);
                    WriteOutcome::Written(receipt)
                }
                Err(e) => {
                    warn!("Delete of {} failed: {:#}", path, e);
                    WriteOutcome::failed(format!("{e:#}"))
                }
            }
        };

        self.queue.submit(label, job.boxed()).await
    }
}

#[async_trait]
impl Backend for GithubRepo {
    fn kind(&self) -> RepoKind {
        RepoKind::Github
    }

    #[instrument(skip(self), fields(repo = %self.repo_id()))]
    async fn read_file(&self, path: &str) -> ReadOutcome {
        debug!("Reading {}", path);
        self.api.read_contents(path).await
    }

    #[instrument(skip(self, content), fields(repo = %self.repo_id()))]
    async fn write_file(&self, path: &str, content: String) -> WriteOutcome {
        let (label, job) = self.put_job(path, content);
        self.queue.submit(label, job).await
    }

    #[instrument(skip(self, content), fields(repo = %self.repo_id()))]
    async fn write_file_within(
        &self,
        path: &str,
        content: String,
        timeout: Duration,
    ) -> WriteOutcome {
        let (label, job) = self.put_job(path, content);
        self.queue.submit_within(label, job, Some(timeout)).await
    }

    fn repo_id(&self) -> String {
        format!("{}/{}", self.options.username, self.options.repo)
    }

    fn descriptor(&self) -> RepoDescriptor {
        RepoDescriptor::Github(self.options.clone())
    }
}

/// Entry as returned by `GET contents/{path}`
#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteContentsBody<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

struct ContentsApi {
    client: Client,
    base_url: Url,
    owner: String,
    repo: String,
    branch: String,
    token: String,
    conflict_backoff: Duration,
}

impl ContentsApi {
    /// Every path segment is percent-encoded, so `#` or `?` in an entry
    /// name stay part of the path.
    fn contents_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked at construction: the base can always take segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
                .extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
    }

    /// `Ok(None)` when the path does not exist on the branch.
    async fn get_entry(&self, path: &str) -> anyhow::Result<Option<ContentsEntry>> {
        let response = self
            .authorized(self.client.get(self.contents_url(path)))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to fetch {path}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "Fetch").await?;
        let entry = response
            .json::<ContentsEntry>()
            .await
            .with_context(|| format!("Malformed contents response for {path}"))?;
        Ok(Some(entry))
    }

    async fn fetch_sha(&self, path: &str) -> anyhow::Result<Option<String>> {
        let sha = self.get_entry(path).await?.map(|entry| entry.sha);
        debug!("Current sha of {}: {:?}", path, sha);
        Ok(sha)
    }

    async fn read_contents(&self, path: &str) -> ReadOutcome {
        match self.get_entry(path).await {
            Ok(Some(entry)) => match decode_content(entry.content.as_deref().unwrap_or_default()) {
                Ok(content) => ReadOutcome::Found { content },
                Err(e) => ReadOutcome::failed(format!("{e:#}")),
            },
            Ok(None) => ReadOutcome::NotFound,
            Err(e) => {
                warn!("Read of {} failed: {:#}", path, e);
                ReadOutcome::failed(format!("{e:#}"))
            }
        }
    }

    async fn send_put(
        &self,
        path: &str,
        encoded: &str,
        message: &str,
        sha: Option<&str>,
    ) -> anyhow::Result<Response> {
        let body = PutContentsBody {
            message,
            content: encoded,
            branch: &self.branch,
            sha,
        };

        self.authorized(self.client.put(self.contents_url(path)))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send write for {path}"))
    }

    async fn put_contents(&self, path: &str, content: &str) -> anyhow::Result<WriteReceipt> {
        let encoded = general_purpose::STANDARD.encode(content);

        let current_sha = self.fetch_sha(path).await?;
        let message = commit_message(path, current_sha.is_some(), false);
        let mut response = self
            .send_put(path, &encoded, &message, current_sha.as_deref())
            .await?;

        if is_conflict(response.status()) {
            warn!(
                "Version conflict writing {} [{}], retrying once",
                path,
                response.status()
            );
            tokio::time::sleep(self.conflict_backoff).await;

            let fresh_sha = self.fetch_sha(path).await?;
            let message = commit_message(path, fresh_sha.is_some(), true);
            response = self
                .send_put(path, &encoded, &message, fresh_sha.as_deref())
                .await?;
        }

        let response = ensure_success(response, "Write").await?;
        let data: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Malformed write response for {path}"))?;
        let sha = data["content"]["sha"].as_str().map(str::to_string);

        Ok(WriteReceipt {
            path: path.to_string(),
            sha,
            response: Some(data),
        })
    }

    async fn delete_contents(&self, path: &str, message: &str) -> anyhow::Result<WriteReceipt> {
        let sha = self
            .fetch_sha(path)
            .await?
            .ok_or_else(|| anyhow!("File not found: {path}"))?;

        let body = DeleteContentsBody {
            message,
            sha: &sha,
            branch: &self.branch,
        };
        let response = self
            .authorized(self.client.delete(self.contents_url(path)))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send delete for {path}"))?;

        let response = ensure_success(response, "Delete").await?;
        let data: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Malformed delete response for {path}"))?;

        Ok(WriteReceipt {
            path: path.to_string(),
            sha: None,
            response: Some(data),
        })
    }
}

async fn ensure_success(response: Response, action: &str) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    bail!("{action} failed [{}]: {text}", status.as_u16())
}

/// 409 is a stale sha. 422 is what the API answers when a sha was required
/// but missing, i.e. the file appeared after the sha fetch; it also covers
/// plain validation errors, which then cost one extra attempt.
fn is_conflict(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn commit_message(path: &str, exists: bool, retry: bool) -> String {
    let verb = if exists { "Update" } else { "Create" };
    if retry {
        format!("{verb} {path} (retry after conflict)")
    } else {
        format!("{verb} {path}")
    }
}

/// The API wraps base64 payloads at 60 columns.
fn decode_content(encoded: &str) -> anyhow::Result<String> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .context("Content is not valid base64")?;
    String::from_utf8(bytes).context("Content is not valid utf-8")
}
