//! Error responses.

use std::fmt::Display;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::auth::GateRejection;

use super::dto::ErrorResponse;

/// Application error type.
///
/// Every variant renders as `{ "error": message }`. Internal failures
/// carry a private detail that is logged and never sent to the client.
#[derive(Debug)]
pub enum AppError {
    Unauthenticated { message: &'static str },
    BadRequest { message: &'static str },
    NotFound { message: &'static str },
    Conflict { message: &'static str },
    Internal { message: &'static str, detail: String },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AppError::Unauthenticated { message }
            | AppError::BadRequest { message }
            | AppError::NotFound { message }
            | AppError::Conflict { message }
            | AppError::Internal { message, .. } => message,
        }
    }
}

/// Turn any failure into an internal error with a fixed public message.
pub trait OrInternal<T> {
    fn or_internal(self, message: &'static str) -> Result<T, AppError>;
}

impl<T, E: Display> OrInternal<T> for Result<T, E> {
    fn or_internal(self, message: &'static str) -> Result<T, AppError> {
        self.map_err(|e| AppError::Internal {
            message,
            detail: e.to_string(),
        })
    }
}

impl From<GateRejection> for AppError {
    fn from(rejection: GateRejection) -> Self {
        AppError::Unauthenticated {
            message: rejection.public_message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal { message, detail } => error!(%status, %detail, "{message}"),
            rejected => warn!(%status, reason = rejected.message(), "request rejected"),
        }

        let body = Json(ErrorResponse {
            error: self.message(),
        });
        (status, body).into_response()
    }
}
