//! Email verification endpoints.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::error::{ApiError, ErrorBody};

use super::state::AuthState;
use super::storage::{ResendOutcome, consume_verification_token, enqueue_resend_verification};
use super::types::{ResendVerificationRequest, VerifyEmailRequest};
use super::utils::{normalize_email, valid_email};

/// Verify the email link by consuming the hashed token.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Invalid or expired token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation("Missing token".to_string()));
    }

    // Hash the token before lookup; raw tokens are never stored server-side.
    if consume_verification_token(&pool, token)
        .await
        .map_err(ApiError::Internal)?
    {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::Validation("Invalid or expired token".to_string()))
    }
}

/// Resend a verification email (always returns 204 to avoid user enumeration).
#[utoipa::path(
    post,
    path = "/v1/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 204, description = "Resend accepted")
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return StatusCode::NO_CONTENT;
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // Always return 204 for invalid emails to avoid account probing.
        return StatusCode::NO_CONTENT;
    }

    match enqueue_resend_verification(&pool, &email, auth_state.config()).await {
        Ok(ResendOutcome::Queued | ResendOutcome::Cooldown | ResendOutcome::Noop) => {
            StatusCode::NO_CONTENT
        }
        Err(err) => {
            error!("failed to enqueue resend verification: {err:#}");
            // Avoid leaking failures; always return 204 to callers.
            StatusCode::NO_CONTENT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::tokens::TokenKeys;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let keys = TokenKeys::new(
            &SecretString::from("access-secret".to_string()),
            &SecretString::from("refresh-secret".to_string()),
        )
        .expect("build keys");
        Arc::new(AuthState::new(
            AuthConfig::new("http://localhost:5173".to_string()),
            keys,
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn verify_email_missing_payload() -> Result<()> {
        let err = verify_email(Extension(lazy_pool()?), None)
            .await
            .expect_err("missing payload must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_empty_token() -> Result<()> {
        let err = verify_email(
            Extension(lazy_pool()?),
            Some(Json(VerifyEmailRequest {
                token: " ".to_string(),
            })),
        )
        .await
        .expect_err("empty token must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn resend_verification_invalid_email_is_opaque() -> Result<()> {
        let response = resend_verification(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(ResendVerificationRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }
}
