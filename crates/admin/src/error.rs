//! Unified error handling for the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::inventory::StoreError;
use crate::services::ledger_api::BatchUpdateResponse;

/// Application-level error type.
///
/// Rendered as the `{ "success": false, "error": ... }` body the ledger
/// endpoints use for every failure.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage call failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or wrong API key.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Endpoint disabled or access denied.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other.into()),
        }
    }
}

impl AppError {
    /// Map a store failure, surfacing repository "not found" as 404.
    #[must_use]
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Repository(RepositoryError::NotFound(what)) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Store(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Ledger request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (self.status(), Json(BatchUpdateResponse::failure(message))).into_response()
    }
}
