//! Error responses for the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::slack::SignatureError;

/// Error body containing code and message
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    error: ErrorBody,
}

/// Application error returned by handlers
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(status: StatusCode, code: &'static str, message: &'static str) -> Self {
        Self {
            status,
            code,
            message,
        }
    }

    /// Status code of the response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.status.as_u16() {
            400..=499 => tracing::warn!("Client error: {} - {}", self.code, self.message),
            500..=599 => tracing::error!("Server error: {} - {}", self.code, self.message),
            _ => {}
        }

        (
            self.status,
            Json(ApiErrorResponse {
                error: ErrorBody {
                    code: self.code,
                    message: self.message,
                },
            }),
        )
            .into_response()
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        tracing::debug!("Rejecting unsigned request: {err}");
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_signature",
            "Request signature verification failed",
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::warn!("Invalid event payload: {err}");
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_payload",
            "Request body is not a valid event payload",
        )
    }
}
