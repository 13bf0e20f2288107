//! Administrative endpoints.
//!
//! Every route here is bearer-authenticated and role-gated. A valid token
//! with the wrong role gets 403; the allow-lists below are per route, not
//! per module.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorBody};
use crate::password;
use crate::roles::{ADMIN_ROLES, Role};

use super::auth::principal::require_admin;
use super::auth::register::MIN_PASSWORD_LENGTH;
use super::auth::session::principal_response;
use super::auth::types::{CreateTeacherRequest, PrincipalResponse, UserListResponse};
use super::auth::{
    AuthState, PrincipalRecord, SignupOutcome, delete_user_cascade, display_name,
    insert_provisioned_principal, list_user_principals, lookup_principal_by_email,
    lookup_principal_by_id, normalize_email, valid_email,
};

/// Roles allowed to provision teacher accounts.
const TEACHER_PROVISIONERS: &[Role] = &[Role::Superadmin, Role::Contentmanager];

/// Only the superadmin may delete accounts.
const USER_DELETERS: &[Role] = &[Role::Superadmin];

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    responses(
        (status = 200, description = "All user accounts, newest first", body = UserListResponse),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let _admin = require_admin(&headers, &pool, &auth_state, &ADMIN_ROLES).await?;

    let records: Vec<PrincipalRecord> = list_user_principals(&pool)
        .await
        .map_err(ApiError::Internal)?;
    let users = records.iter().map(principal_response).collect();
    Ok((StatusCode::OK, Json(UserListResponse { users })).into_response())
}

#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}",
    params(
        ("id" = String, Path, description = "User principal id or email")
    ),
    responses(
        (status = 200, description = "The matching user account", body = PrincipalResponse),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn get_user(
    Path(identifier): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let _admin = require_admin(&headers, &pool, &auth_state, &ADMIN_ROLES).await?;

    let record = match Uuid::parse_str(identifier.trim()) {
        Ok(id) => lookup_principal_by_id(&pool, id).await,
        Err(_) => lookup_principal_by_email(&pool, &normalize_email(&identifier)).await,
    }
    .map_err(ApiError::Internal)?;

    // Admin accounts are not exposed through the user-management surface.
    match record.filter(|record| !record.role.is_admin()) {
        Some(record) => Ok((StatusCode::OK, Json(principal_response(&record))).into_response()),
        None => Err(ApiError::NotFound),
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/teachers",
    request_body = CreateTeacherRequest,
    responses(
        (status = 201, description = "Teacher account created", body = PrincipalResponse),
        (status = 400, description = "Invalid input or email already exists", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn create_teacher(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateTeacherRequest>>,
) -> Result<Response, ApiError> {
    let admin = require_admin(&headers, &pool, &auth_state, TEACHER_PROVISIONERS).await?;

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

    match insert_provisioned_principal(&pool, &name, &email, &password_hash, Role::Teacher)
        .await
        .map_err(ApiError::Internal)?
    {
        SignupOutcome::Created(record) => {
            info!(admin = %admin.id, teacher = %record.id, "teacher account provisioned");
            Ok((StatusCode::CREATED, Json(principal_response(&record))).into_response())
        }
        SignupOutcome::Conflict => Err(ApiError::Conflict("Email already exists")),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User principal id")
    ),
    responses(
        (status = 204, description = "User and all their content deleted"),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn delete_user(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let admin = require_admin(&headers, &pool, &auth_state, USER_DELETERS).await?;

    // The cascade either removes the user plus all their content or nothing.
    if delete_user_cascade(&pool, id)
        .await
        .map_err(ApiError::Internal)?
    {
        info!(admin = %admin.id, user = %id, "user account deleted");
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::AuthConfig;
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

    fn lazy_pool() -> Result<sqlx::PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn get_user_requires_bearer_token() -> Result<()> {
        let err = get_user(
            Path("alice@example.com".to_string()),
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
        )
        .await
        .expect_err("missing bearer must fail");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn create_teacher_requires_bearer_token() -> Result<()> {
        let err = create_teacher(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            None,
        )
        .await
        .expect_err("missing bearer must fail");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
