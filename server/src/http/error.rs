use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use repository::RepoError;
use shared_types::RemoteResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing or invalid access key")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The backing repository failed or timed out
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(RemoteResponse {
            content: serde_json::Value::Null,
            error: Some(self.to_string()),
        });

        (status, body).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RepoError::Backend { .. } | RepoError::TimedOut { .. } | RepoError::Http(_) => {
                ApiError::Upstream(err.to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
