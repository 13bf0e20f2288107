//! Error taxonomy for the HTTP surface.
//!
//! Validation problems are caught at the boundary before core logic runs;
//! authentication and authorization failures short-circuit the pipeline with
//! intentionally generic messages; everything else is mapped to a 500 whose
//! detail is logged server-side only.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Wire shape for every error body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input, 400 with a field-level message.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or an invalid/expired token, 401. The message stays
    /// generic so callers cannot tell which check failed.
    #[error("{0}")]
    Authentication(&'static str),

    /// Valid principal, wrong role, 403. Distinct from authentication.
    #[error("{0}")]
    Authorization(&'static str),

    #[error("Not found")]
    NotFound,

    /// Duplicate email. Surfaced as 400 to match the public contract.
    #[error("{0}")]
    Conflict(&'static str),

    /// Persistence or signing failure; detail never reaches the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(err) => {
                // Full chain goes to the log, never to the response body.
                error!("internal error: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("Email is required".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authentication("Invalid credentials").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Authorization("Admin access required").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("Email already exists").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_suppressed() {
        let response = ApiError::Internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn authentication_message_is_generic() {
        let err = ApiError::Authentication("Invalid credentials");
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}
