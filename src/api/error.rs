//! HTTP rendering of authentication errors.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::error::AuthError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized {
        message: String,
        challenges: Vec<String>,
    },
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, challenges) = match self {
            ApiError::Unauthorized {
                message,
                challenges,
            } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, challenges),
            ApiError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{resource} not found."),
                vec![],
            ),
            ApiError::ServiceUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                message,
                vec![],
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
                vec![],
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let value = if challenges.is_empty() {
                "Bearer".to_string()
            } else {
                challenges.join(", ")
            };
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match &e {
            AuthError::AuthenticationFailed(failure) => ApiError::Unauthorized {
                message: failure.message().to_string(),
                challenges: failure.challenges().to_vec(),
            },
            AuthError::Timeout(_) => ApiError::ServiceUnavailable(e.to_string()),
            // Server-side faults; the caller only sees a generic 500
            AuthError::ProviderInternal { .. }
            | AuthError::ProviderConstruction { .. }
            | AuthError::UnknownProvider(_) => {
                error!("authentication error: {}", e);
                ApiError::Internal
            }
        }
    }
}
