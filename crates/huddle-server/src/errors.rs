//! Server startup and HTTP API errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huddle_core::{GroupId, StoreError};
use serde_json::json;
use thiserror::Error;

/// Failure to start or run the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Any other socket error.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by the JSON API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid token.
    #[error("authentication required")]
    Unauthorized,

    /// The group does not exist.
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::GroupNotFound(_) | Self::Store(StoreError::GroupNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::GroupNotFound(_) | Self::Store(StoreError::GroupNotFound(_)) => "GROUP_NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "api request failed");
        }
        // Server-side details stay in the logs.
        let message = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = json!({
            "error": message,
            "error_code": self.error_code(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::GroupNotFound(GroupId(1)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Unavailable("x".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(StoreError::Database("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let resp = ApiError::from(StoreError::Database("secret path".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"], "internal server error");
        assert_eq!(parsed["error_code"], "STORE_ERROR");
    }
}
