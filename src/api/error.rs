//! API error mapping
//!
//! Store errors become plain-text responses. Back-end details stay in the
//! log; the client sees a short message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::StoreError;
use crate::token::TokenError;

/// Errors returned from handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Store call failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Token could not be generated
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Path does not name a well-formed token
    #[error("not found")]
    NotFound,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) if err.is_retriable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(StoreError::InvalidToken(_)) | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(StoreError::DuplicateToken(_)) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Store(StoreError::InvalidToken(_)) | Self::NotFound => "invalid token",
            Self::Store(StoreError::DuplicateToken(_)) => "token already exists",
            Self::Store(StoreError::StorageUnavailable(_)) => {
                "The database is having some trouble... try again?"
            }
            Self::Store(StoreError::UnsupportedBackend(_)) | Self::Token(_) => {
                "Something bad happened... try again?"
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(StoreError::invalid_token("t")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::duplicate_token("t")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::unavailable("down")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(StoreError::unsupported("x")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_retriable_errors_are_unavailable() {
        let errors = [
            StoreError::invalid_token("t"),
            StoreError::duplicate_token("t"),
            StoreError::unavailable("down"),
            StoreError::unsupported("x"),
        ];
        for err in errors {
            let retriable = err.is_retriable();
            let status = ApiError::from(err).status();
            assert_eq!(retriable, status == StatusCode::SERVICE_UNAVAILABLE, "{status}");
        }
    }
}
