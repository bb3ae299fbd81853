use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use shared_types::{
    ReadOutcome, RemoteMethod, RemoteOptions, RemoteRequest, RemoteResponse, RepoDescriptor,
    RepoKind, WriteOutcome, WriteReceipt,
};
use std::time::Duration;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::Backend;

/// Repository proxied through a remote-repo HTTP endpoint
pub struct RemoteRepo {
    options: RemoteOptions,
    client: Client,
    base_url: String,
}

impl RemoteRepo {
    pub fn new(options: RemoteOptions) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base_url = options.url.trim_end_matches('/').to_string();

        Ok(Self {
            options,
            client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        method: RemoteMethod,
        request: &RemoteRequest,
    ) -> anyhow::Result<(StatusCode, RemoteResponse)> {
        let url = format!("{}/remote-repo/{}", self.base_url, method.as_str());

        let mut builder = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(request);
        if let Some(key) = &self.options.key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {url}"))?;

        let parsed = serde_json::from_str::<RemoteResponse>(&body);
        let envelope = match parsed {
            Ok(envelope) => envelope,
            // Error pages and empty bodies carry no envelope
            Err(_) if !status.is_success() || body.trim().is_empty() => RemoteResponse {
                content: serde_json::Value::Null,
                error: (!body.trim().is_empty()).then_some(body),
            },
            Err(e) => return Err(anyhow!("Malformed response from {url}: {e}")),
        };

        Ok((status, envelope))
    }
}

fn status_error(action: &str, status: StatusCode, envelope: RemoteResponse) -> String {
    format!(
        "{action} failed [{}]: {}",
        status.as_u16(),
        envelope.error.unwrap_or_default()
    )
}

#[async_trait]
impl Backend for RemoteRepo {
    fn kind(&self) -> RepoKind {
        RepoKind::Remote
    }

    #[instrument(skip(self))]
    async fn read_file(&self, path: &str) -> ReadOutcome {
        let request = RemoteRequest {
            path: path.to_string(),
            content: None,
        };

        match self.call(RemoteMethod::Read, &request).await {
            Ok((StatusCode::NOT_FOUND, _)) => ReadOutcome::NotFound,
            Ok((status, envelope)) if !status.is_success() => {
                ReadOutcome::failed(status_error("Read", status, envelope))
            }
            Ok((_, envelope)) => match envelope.content {
                serde_json::Value::Null => ReadOutcome::NotFound,
                serde_json::Value::String(content) => ReadOutcome::Found { content },
                other => ReadOutcome::failed(format!("Unexpected content for {path}: {other}")),
            },
            Err(e) => {
                warn!("Remote read of {} failed: {:#}", path, e);
                ReadOutcome::failed(format!("{e:#}"))
            }
        }
    }

    #[instrument(skip(self, content))]
    async fn write_file(&self, path: &str, content: String) -> WriteOutcome {
        let request = RemoteRequest {
            path: path.to_string(),
            content: Some(content),
        };

        match self.call(RemoteMethod::Write, &request).await {
            Ok((status, envelope)) if !status.is_success() => {
                WriteOutcome::failed(status_error("Write", status, envelope))
            }
            Ok((_, envelope)) => WriteOutcome::Written(WriteReceipt {
                path: path.to_string(),
                sha: envelope.content["sha"].as_str().map(str::to_string),
                response: Some(envelope.content),
            }),
            Err(e) => {
                warn!("Remote write of {} failed: {:#}", path, e);
                WriteOutcome::failed(format!("{e:#}"))
            }
        }
    }

    fn repo_id(&self) -> String {
        self.options.url.clone()
    }

    fn descriptor(&self) -> RepoDescriptor {
        RepoDescriptor::Remote(self.options.clone())
    }
}
