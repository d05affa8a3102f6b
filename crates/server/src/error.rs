use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use remedy_engine::EngineError;
use thiserror::Error;

/// Errors that can occur when running the Remedy server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An engine error surfaced through the API.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The request body or parameters were invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The ingestion queue is full or shutting down.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine(e) => match e {
                EngineError::ApprovalNotFound(_) | EngineError::RequestNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                EngineError::InvalidDecision(_) | EngineError::RollbackNotAllowed(_) => {
                    StatusCode::CONFLICT
                }
                EngineError::Core(_) | EngineError::Configuration(_) => StatusCode::BAD_REQUEST,
                EngineError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (
                ServerError::from(EngineError::RequestNotFound(Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::from(EngineError::RollbackNotAllowed("x".into())),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::from(EngineError::Configuration("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::Unavailable("queue full".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServerError::Internal("task panicked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
