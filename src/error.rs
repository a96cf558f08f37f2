/*
 * Responsibility
 * - Shared AppError for the whole service
 * - IntoResponse (HTTP status / JSON error body)
 * - Maps authorization decisions and config/repo failures onto statuses
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::repos::error::RepoError;
use crate::services::authz::{AuthorizeError, DenyReason};

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
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("missing bearer credential")]
    MissingCredential,
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: &'static str },
    #[error("forbidden")]
    Forbidden,
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::MissingCredential | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Configuration(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        if reason.is_forbidden() {
            AppError::Forbidden
        } else {
            AppError::Unauthorized {
                reason: reason.as_str(),
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(_) => AppError::Internal,
        }
    }
}

impl From<AuthorizeError> for AppError {
    fn from(e: AuthorizeError) -> Self {
        match e {
            AuthorizeError::Config(e) => AppError::Configuration(e),
            AuthorizeError::Repo(e) => AppError::from(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::BadRequest { code, message } => (code, message),
            AppError::MissingCredential => (
                "MISSING_CREDENTIAL",
                "bearer token required".to_string(),
            ),
            AppError::Unauthorized { reason } => ("UNAUTHENTICATED", reason.to_string()),
            AppError::Forbidden => ("FORBIDDEN", "forbidden".to_string()),
            // Which setting is missing goes to the log, not to the client.
            AppError::Configuration(err) => {
                tracing::error!(error = %err, "authorization is misconfigured");
                (
                    "CONFIGURATION_ERROR",
                    "authorization service misconfigured".to_string(),
                )
            }
            AppError::Internal => (
                "INTERNAL_SERVER_ERROR",
                "internal server error".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}
