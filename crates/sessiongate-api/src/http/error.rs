//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use sessiongate_types::error::{DispatchError, SessionError, UploadError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    Dispatch(DispatchError),
    Upload(UploadError),
    /// Malformed request that never reached the gateway.
    Validation(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        AppError::Dispatch(e)
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        AppError::Upload(e)
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Session(SessionError::InvalidUserId(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Session(SessionError::AlreadyExists(_)) => {
                (StatusCode::CONFLICT, "SESSION_EXISTS")
            }
            AppError::Session(SessionError::NotFound(_))
            | AppError::Dispatch(DispatchError::SessionNotFound(_)) => {
                (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND")
            }
            AppError::Session(SessionError::ClientUnavailable(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CLIENT_UNAVAILABLE")
            }
            AppError::Dispatch(DispatchError::InvalidRecipient(_))
            | AppError::Dispatch(DispatchError::EmptyContent(_))
            | AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Dispatch(DispatchError::NotConnected { .. }) => {
                (StatusCode::BAD_REQUEST, "SESSION_NOT_CONNECTED")
            }
            AppError::Upload(UploadError::UnsupportedType { .. }) => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_FILE_TYPE")
            }
            AppError::Upload(UploadError::TooLarge { .. }) => {
                (StatusCode::BAD_REQUEST, "FILE_TOO_LARGE")
            }
            AppError::Upload(UploadError::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPLOAD_ERROR")
            }
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Session(e) => e.to_string(),
            AppError::Dispatch(e) => e.to_string(),
            AppError::Upload(e) => e.to_string(),
            AppError::Validation(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(%code, %message, "request failed");
        } else {
            tracing::debug!(%code, %message, "request rejected");
        }
        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}
