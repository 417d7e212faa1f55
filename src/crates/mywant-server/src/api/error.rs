//! API error types and HTTP response conversion.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mywant_core::WantError;

/// Error body returned for every non-2xx response: a human-readable
/// `message` plus a machine-readable `kind` tag (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub kind: String,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Want(#[from] WantError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Want(WantError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Want(WantError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Want(WantError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Want(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Want(err) => err.kind(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorResponse {
            kind: self.kind().to_string(),
            message: self.to_string(),
        };
        tracing::warn!(kind = body.kind, message = body.message, "request failed");
        (status, Json(body)).into_response()
    }
}
