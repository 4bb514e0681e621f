//! Maps [`pvs_core::MediaError`] (plus a few server-only failure modes)
//! onto HTTP responses, grounded on `ferrex-server::errors`'s
//! `AppError` -> `IntoResponse` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use pvs_core::MediaError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("no input reference given")]
    MissingInput,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Media(MediaError::BadInput(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Media(MediaError::InvalidPage(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Media(MediaError::UnsupportedType(ext)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, format!("unsupported type: {ext}"))
            }
            AppError::Media(MediaError::InvalidFormat { backend, format }) => (
                StatusCode::BAD_REQUEST,
                format!("backend {backend} cannot produce format {format}"),
            ),
            AppError::Media(MediaError::Transport(msg)) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Media(MediaError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            AppError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            AppError::MissingInput => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request failed");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
