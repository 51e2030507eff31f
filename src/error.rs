use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::forms::FormError;

/// RepoError
///
/// Failure talking to the relational store. "Row not found" is not an error;
/// lookups return `Ok(None)` for that.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// ErrorBody
///
/// JSON body of every error response. `retryable` tells the client whether
/// the same request may succeed if simply sent again.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// AppError
///
/// Handler-boundary error taxonomy. Read failures carry the backend message
/// through to the client because the read-path error state shows it; write
/// failures only expose a generic message and keep the detail in the log.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthorized,

    #[error("not permitted: {0}")]
    Forbidden(&'static str),

    #[error("not found")]
    NotFound,

    #[error("confirmation required")]
    ConfirmationRequired,

    #[error("invalid form: {0}")]
    Validation(#[from] FormError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{operation} failed: {source}")]
    Read {
        operation: &'static str,
        source: RepoError,
    },

    #[error("{operation} failed: {source}")]
    Write {
        operation: &'static str,
        source: RepoError,
    },

    #[error("service misconfigured: missing {0}")]
    Misconfigured(String),
}

impl AppError {
    pub fn read(operation: &'static str) -> impl FnOnce(RepoError) -> AppError {
        move |source| AppError::Read { operation, source }
    }

    pub fn write(operation: &'static str) -> impl FnOnce(RepoError) -> AppError {
        move |source| AppError::Write { operation, source }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ConfirmationRequired | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Read { .. } | AppError::Misconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, message, retryable, field) = match self {
            AppError::Unauthorized => ("unauthorized", self.to_string(), false, None),
            AppError::Forbidden(_) => ("forbidden", self.to_string(), false, None),
            AppError::NotFound => ("not_found", self.to_string(), false, None),
            AppError::ConfirmationRequired => (
                "confirmation_required",
                "repeat the request with confirm=true".to_string(),
                false,
                None,
            ),
            AppError::Validation(e) => (
                "validation",
                e.message.clone(),
                false,
                Some(e.field.to_string()),
            ),
            AppError::BadRequest(msg) => ("bad_request", msg.clone(), false, None),
            AppError::Read { source, .. } => ("read_failed", source.to_string(), true, None),
            AppError::Write { .. } => (
                "write_failed",
                "the change could not be saved, please try again".to_string(),
                true,
                None,
            ),
            AppError::Misconfigured(_) => ("misconfigured", self.to_string(), false, None),
        };
        ErrorBody {
            error: error.to_string(),
            message,
            retryable,
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Read { .. } | AppError::Write { .. } | AppError::Misconfigured(_) => {
                tracing::error!(error = %self, "request failed")
            }
            _ => tracing::debug!(error = %self, "request rejected"),
        }
        (self.status(), Json(self.body())).into_response()
    }
}
