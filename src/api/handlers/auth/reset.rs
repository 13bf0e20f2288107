//! Password reset endpoints.
//!
//! The forgot-password response is always 204: whether the email exists, and
//! whether it belongs to a user or an admin account, is never observable.
//! Consuming a reset token also revokes every outstanding refresh token for
//! the principal, since whoever triggered the reset may not be the only
//! holder of a live session.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::error::{ApiError, ErrorBody};
use crate::password;

use super::register::MIN_PASSWORD_LENGTH;
use super::state::AuthState;
use super::storage::{consume_reset_token, request_password_reset};
use super::types::{ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{normalize_email, valid_email};

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Reset accepted")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return StatusCode::NO_CONTENT;
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // Always 204 for malformed emails to avoid account probing.
        return StatusCode::NO_CONTENT;
    }

    if let Err(err) = request_password_reset(&pool, &email, auth_state.config()).await {
        // Fail closed but keep the response opaque.
        error!("failed to queue password reset: {err:#}");
    }
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password/{token}",
    request_body = ResetPasswordRequest,
    params(
        ("token" = String, Path, description = "Opaque reset token from the emailed link")
    ),
    responses(
        (status = 204, description = "Password updated, all sessions revoked"),
        (status = 400, description = "Invalid or expired token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    Path(token): Path<String>,
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation("Missing token".to_string()));
    }

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let password_hash = password::hash(&request.password)
        .await
        .map_err(ApiError::Internal)?;

    match consume_reset_token(&pool, token, &password_hash)
        .await
        .map_err(ApiError::Internal)?
    {
        Some(id) => {
            debug!(principal = %id, "password reset consumed");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        // Wrong token and expired token are deliberately the same outcome.
        None => Err(ApiError::Validation(
            "Invalid or expired reset token".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn reset_password_missing_payload() -> Result<()> {
        let err = reset_password(Path("token".to_string()), Extension(lazy_pool()?), None)
            .await
            .expect_err("missing payload must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_blank_token() -> Result<()> {
        let err = reset_password(
            Path("  ".to_string()),
            Extension(lazy_pool()?),
            Some(Json(ResetPasswordRequest {
                password: "hunter2!".to_string(),
            })),
        )
        .await
        .expect_err("blank token must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_short_password() -> Result<()> {
        let err = reset_password(
            Path("token".to_string()),
            Extension(lazy_pool()?),
            Some(Json(ResetPasswordRequest {
                password: "abc".to_string(),
            })),
        )
        .await
        .expect_err("short password must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
