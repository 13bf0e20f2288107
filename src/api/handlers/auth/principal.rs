//! Authenticated principal extraction and authorization helpers.
//!
//! Access tokens are verified statelessly, then the subject is confirmed to
//! still exist so a deleted account's tokens stop working before they expire.
//! Authentication failures are always the same generic 401; role failures are
//! a distinct 403. Both helpers hand the loaded row back so handlers never
//! need a second lookup.

use axum::http::HeaderMap;
use sqlx::PgPool;

use crate::api::error::ApiError;
use crate::roles::Role;

use super::session::extract_bearer_token;
use super::state::AuthState;
use super::storage::{PrincipalRecord, lookup_principal_by_id};

const AUTH_REQUIRED: &str = "Authentication required";

/// Resolve a bearer access token into the stored principal row, or return 401.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<PrincipalRecord, ApiError> {
    let token =
        extract_bearer_token(headers).ok_or(ApiError::Authentication(AUTH_REQUIRED))?;
    let claims = auth_state
        .keys()
        .verify_access(&token)
        .map_err(|_| ApiError::Authentication(AUTH_REQUIRED))?;

    lookup_principal_by_id(pool, claims.sub)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Authentication(AUTH_REQUIRED))
}

/// Like [`require_auth`], but additionally requires one of the given admin
/// roles. A valid non-admin token gets 403, not 401.
pub async fn require_admin(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
    allowed: &[Role],
) -> Result<PrincipalRecord, ApiError> {
    let record = require_auth(headers, pool, auth_state).await?;
    if !record.role.is_admin() {
        return Err(ApiError::Authorization("Admin access required"));
    }
    if !allowed.contains(&record.role) {
        return Err(ApiError::Authorization("Insufficient privileges"));
    }
    Ok(record)
}
