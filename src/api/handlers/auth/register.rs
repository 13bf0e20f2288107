//! Self-service registration.

use axum::{Json, extract::Extension, http::StatusCode, response::{IntoResponse, Response}};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::error::{ApiError, ErrorBody};
use crate::password;

use super::session::principal_response;
use super::state::AuthState;
use super::storage::{SignupOutcome, insert_user};
use super::types::{PrincipalResponse, RegisterRequest};
use super::utils::{display_name, normalize_email, valid_email};

pub(crate) const MIN_PASSWORD_LENGTH: usize = 6;

/// Create a student account and queue the verification email.
///
/// Registration never issues tokens; the new account logs in like any other.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = PrincipalResponse),
        (status = 400, description = "Invalid input or email already exists", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    let name = display_name(request.name.as_deref(), &email);

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let password_hash = password::hash(&request.password)
        .await
        .map_err(ApiError::Internal)?;

    match insert_user(&pool, &name, &email, &password_hash, auth_state.config())
        .await
        .map_err(ApiError::Internal)?
    {
        SignupOutcome::Created(record) => {
            Ok((StatusCode::CREATED, Json(principal_response(&record))).into_response())
        }
        SignupOutcome::Conflict => Err(ApiError::Conflict("Email already exists")),
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
    async fn register_missing_payload() -> Result<()> {
        let err = register(Extension(lazy_pool()?), Extension(auth_state()), None)
            .await
            .expect_err("missing payload must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() -> Result<()> {
        let err = register(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                name: Some("Alice".to_string()),
                email: "not-an-email".to_string(),
                password: "hunter2!".to_string(),
            })),
        )
        .await
        .expect_err("invalid email must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_short_password() -> Result<()> {
        // Password length is validated before any name defaulting matters, so
        // the email-and-password-only body reaches the same check.
        let err = register(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                name: None,
                email: "alice@example.com".to_string(),
                password: "abc".to_string(),
            })),
        )
        .await
        .expect_err("short password must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
