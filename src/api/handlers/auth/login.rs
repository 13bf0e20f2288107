//! Credential login.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

use crate::api::error::{ApiError, ErrorBody};
use crate::password;

use super::session::establish_session;
use super::state::AuthState;
use super::storage::lookup_principal_by_email;
use super::types::{LoginRequest, LoginResponse};
use super::utils::normalize_email;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Exchange email/password for an access token plus refresh cookie.
///
/// One lookup serves both user and admin accounts; the response never reveals
/// whether the email exists or which kind it is.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let record = lookup_principal_by_email(&pool, &email)
        .await
        .map_err(ApiError::Internal)?;
    let Some(record) = record else {
        debug!("login failed: unknown email");
        return Err(ApiError::Authentication(INVALID_CREDENTIALS));
    };

    if !password::verify(&request.password, &record.password_hash).await {
        debug!(principal = %record.id, "login failed: password mismatch");
        return Err(ApiError::Authentication(INVALID_CREDENTIALS));
    }

    let (body, cookie) = establish_session(&pool, &auth_state, &headers, &record).await?;

    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = cookie {
        response_headers.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
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
    async fn login_missing_payload() -> Result<()> {
        let err = login(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            None,
        )
        .await
        .expect_err("missing payload must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_empty_fields() -> Result<()> {
        let err = login(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(LoginRequest {
                email: "  ".to_string(),
                password: String::new(),
            })),
        )
        .await
        .expect_err("empty fields must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
