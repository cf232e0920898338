//! HTTP Error Types
//!
//! Maps application errors to status codes and an `{"errors": [...]}` body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keyrelay_core::error::AppError;
use thiserror::Error;
use tracing::error;

use crate::types::ErrorBody;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("Malformed request body: {0}")]
    Body(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection.body_text())
    }
}

/// Status code for an application error
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidRecord(_) | AppError::UnexpectedParameters(_) | AppError::Domain(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
        AppError::Serialization(_) => StatusCode::BAD_REQUEST,
        AppError::Database(_)
        | AppError::Config(_)
        | AppError::Credential(_)
        | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn json_errors(status: StatusCode, errors: Vec<String>) -> Response {
    (status, Json(ErrorBody { errors })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::App(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    // Internals stay in the logs
                    error!(error = %err, "Request failed");
                    json_errors(status, vec!["Internal server error".to_string()])
                } else {
                    json_errors(status, err.messages())
                }
            }
            ApiError::Body(message) => json_errors(StatusCode::BAD_REQUEST, vec![message]),
        }
    }
}
