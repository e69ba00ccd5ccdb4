//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use docseal_service::DownloadError;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub messages: Vec<String>,
}

/// Error returned by a handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Download(err) => {
                if let DownloadError::Internal(detail) = err {
                    error!(error = %detail, "Request failed");
                }
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, err.public_message())
            }
        };

        (
            status,
            Json(ErrorBody {
                messages: vec![message],
            }),
        )
            .into_response()
    }
}
