use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::PaymentStatus;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("payment not found")]
    PaymentNotFound,

    #[error("expired time must be greater than current time")]
    ExpiredAtInvalid,

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Publish error: {0}")]
    Publish(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Validation(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str()),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::PaymentNotFound => (StatusCode::NOT_FOUND, message.as_str()),
            AppError::ExpiredAtInvalid => (StatusCode::UNPROCESSABLE_ENTITY, message.as_str()),
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, message.as_str()),
            AppError::Gateway(ref msg) => {
                tracing::error!("Gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.as_str())
            }
            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Invoice storage failed")
            }
            AppError::Render(ref msg) => {
                tracing::error!("Render error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invoice rendering failed")
            }
            AppError::Publish(ref msg) => {
                tracing::error!("Publish error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Event publishing failed")
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
