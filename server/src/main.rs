use anyhow::Result;
use repository::Repos;
use server::{http, ServerConfig};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    info!("Starting remote repository server");

    let config = ServerConfig::from_env()?;
    info!("Serving a {} repository", config.descriptor.kind());

    let repository = Repos::with_queue_config(config.queue)
        .open(config.descriptor)
        .await?;
    if config.access_key.is_none() {
        info!("REMOTE_REPO_KEY not set; protocol routes are open");
    }

    let state = http::AppState::new(repository, config.access_key);
    http::start_server(state, config.bind_address).await
}
