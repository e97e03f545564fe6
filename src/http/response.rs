//! Error responses for the dashboard endpoints.
//!
//! # Design Decisions
//! - Validation failures are 422 with the user-facing message
//! - Download API failures are 502 and carry the upstream status and request id
//! - Bodies are always JSON: `{error, message, ...}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::api::ApiError;
use crate::downloads::{BoardError, FileIdError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] FileIdError),
    #[error(transparent)]
    Upstream(#[from] ApiError),
    #[error("{0} not found")]
    NotFound(String),
}

impl From<BoardError> for AppError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::InvalidFileId(e) => Self::Validation(e),
            BoardError::Api(e) => Self::Upstream(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            Self::Validation(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "validation_error", "message": message })),
            )
                .into_response(),
            Self::Upstream(err) => {
                tracing::debug!(error = %err, "Returning upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({
                        "error": err.kind(),
                        "message": message,
                        "upstream_status": err.status(),
                        "request_id": err.request_id(),
                    })),
                )
                    .into_response()
            }
            Self::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "not_found", "message": message })),
            )
                .into_response(),
        }
    }
}
