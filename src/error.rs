//! Error types for the OCR gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ocr::{BackendError, DecodeError};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing field, wrong type or malformed body
    #[error("{0}")]
    InvalidInput(String),

    /// Body exceeds the configured request limit
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Decode(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::InvalidInput(msg) => tracing::warn!("Invalid input: {}", msg),
            AppError::PayloadTooLarge(msg) => tracing::warn!("Request rejected: {}", msg),
            AppError::Decode(e) => tracing::warn!("Image decode failed: {}", e),
            AppError::Backend(e) => tracing::error!("Backend error: {}", e),
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
