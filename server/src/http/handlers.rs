use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use repository::{ReadOptions, WriteOptions};
use shared_types::{RemoteRequest, RemoteResponse, WriteReceipt};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Rejects protocol calls that do not carry the configured bearer key.
pub async fn require_access_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if let Some(expected) = state.access_key.as_deref() {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(expected) {
            warn!("Rejected {} without a valid access key", request.uri().path());
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

/// POST /remote-repo/read
#[instrument(skip(state, request), fields(path = %request.path))]
pub async fn read_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RemoteRequest>,
) -> ApiResult<Json<RemoteResponse>> {
    let content = state
        .repository
        .read(&request.path, &ReadOptions::default())
        .await?;

    Ok(Json(RemoteResponse {
        content: serde_json::Value::String(content),
        error: None,
    }))
}

/// POST /remote-repo/write
///
/// Content is stored as received. Callers that want it encrypted do so on
/// their side before sending.
#[instrument(skip(state, request), fields(path = %request.path))]
pub async fn write_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RemoteRequest>,
) -> ApiResult<Json<RemoteResponse>> {
    let content = request
        .content
        .ok_or_else(|| ApiError::BadRequest(format!("Missing content for {}", request.path)))?;

    let receipt = state
        .repository
        .write(&request.path, &content, &WriteOptions::default())
        .await?;
    info!("Stored {} via remote protocol", receipt.path);

    // The backend's raw payload stays on this side.
    let summary = WriteReceipt {
        response: None,
        ..receipt
    };
    let content =
        serde_json::to_value(summary).map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(RemoteResponse {
        content,
        error: None,
    }))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "remote-repo",
        "repository": state.repository.kind(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
