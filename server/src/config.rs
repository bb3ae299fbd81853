use anyhow::Context;
use repository::{QueueConfig, Repos};
use shared_types::{FsOptions, RepoDescriptor};
use std::net::SocketAddr;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Repository served under `/remote-repo`
    pub descriptor: RepoDescriptor,
    /// Bearer key clients must present, when set
    pub access_key: Option<String>,
    pub queue: QueueConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDRESS is not a socket address")?;

        let descriptor = match std::env::var("REPO_DESCRIPTOR") {
            Ok(raw) => {
                let value = serde_json::from_str(&raw).context("REPO_DESCRIPTOR is not JSON")?;
                Repos::parse_descriptor(value)?
            }
            Err(_) => RepoDescriptor::Fs(FsOptions {
                base_dir: std::env::var("REPO_BASE_DIR")
                    .unwrap_or_else(|_| "./data".to_string())
                    .into(),
                name: std::env::var("REPO_NAME").unwrap_or_else(|_| "default".to_string()),
            }),
        };

        let access_key = std::env::var("REMOTE_REPO_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        Ok(Self {
            bind_address,
            descriptor,
            access_key,
            queue: QueueConfig::from_env()?,
        })
    }
}
