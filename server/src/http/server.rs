use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::{handlers, state::AppState};

pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    let protocol = Router::new()
        .route("/remote-repo/read", post(handlers::read_entry))
        .route("/remote-repo/write", post(handlers::write_entry))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::require_access_key,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protocol)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn start_server(state: AppState, bind_address: SocketAddr) -> Result<()> {
    let repository = Arc::clone(&state.repository);
    let listener = TcpListener::bind(bind_address).await?;
    info!("Server listening on {}", bind_address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    repository.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
