//! Session lifecycle: refresh-cookie handling, token rotation, and logout.
//!
//! The refresh token travels only in an `HttpOnly` cookie scoped to the auth
//! routes; the access token travels only in the JSON body and the
//! `Authorization` header. Every refresh failure answers with the same 401
//! and clears the cookie, so a caller cannot distinguish "expired" from
//! "revoked" from "reused".

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::error::{ApiError, ErrorBody};
use crate::ledger::TokenMeta;

use super::{
    state::{AuthConfig, AuthState},
    storage::{
        PrincipalRecord, RotateOutcome, bump_token_version, record_refresh_token,
        remove_refresh_token, rotate_refresh_token,
    },
    types::{LoginResponse, PrincipalResponse, RefreshResponse},
    utils::{extract_client_ip, extract_user_agent},
};

const REFRESH_COOKIE_NAME: &str = "studia_refresh";

/// Cookie path keeps the refresh token off every non-auth request.
const REFRESH_COOKIE_PATH: &str = "/v1/auth";

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "Access token refreshed", body = RefreshResponse),
        (status = 401, description = "Refresh token missing, expired, or revoked", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let Some(token) = extract_refresh_token(&headers) else {
        return Ok(refresh_rejection(auth_state.config()));
    };

    let claims = match auth_state.keys().verify_refresh(&token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("refresh token rejected: {err}");
            return Ok(refresh_rejection(auth_state.config()));
        }
    };

    let record = super::storage::lookup_principal_by_id(&pool, claims.sub)
        .await
        .map_err(ApiError::Internal)?;
    let Some(record) = record else {
        return Ok(refresh_rejection(auth_state.config()));
    };

    // Mint the replacement pair before touching the ledger so the rotation is
    // a single in-place swap.
    let now = chrono::Utc::now();
    let (access_token, _) = auth_state
        .keys()
        .issue_access(record.id, &record.email, record.role, now)
        .map_err(|err| ApiError::Internal(err.into()))?;
    let (next_refresh, _) = auth_state
        .keys()
        .issue_refresh(record.id, &record.email, record.role, record.token_version, now)
        .map_err(|err| ApiError::Internal(err.into()))?;

    let meta = TokenMeta {
        user_agent: extract_user_agent(&headers),
        ip: extract_client_ip(&headers),
    };
    let outcome = rotate_refresh_token(
        &pool,
        record.id,
        claims.version,
        &token,
        &next_refresh,
        auth_state.config().refresh_ttl_seconds(),
        meta,
    )
    .await
    .map_err(ApiError::Internal)?;

    if outcome == RotateOutcome::Rejected {
        // Already rotated, revoked, or version mismatch. Possibly a replay.
        debug!(principal = %record.id, "refresh token rotation rejected");
        return Ok(refresh_rejection(auth_state.config()));
    }

    let body = RefreshResponse {
        access_token,
        expires_in: auth_state.config().access_ttl_seconds(),
    };
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = refresh_cookie(auth_state.config(), &next_refresh) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Best effort: drop the presented token from its ledger. A token that no
    // longer verifies still gets its cookie cleared.
    if let Some(token) = extract_refresh_token(&headers) {
        if let Ok(claims) = auth_state.keys().verify_refresh(&token) {
            if let Err(err) = remove_refresh_token(&pool, claims.sub, &token).await {
                error!("failed to remove refresh token: {err:#}");
            }
        }
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout-all",
    responses(
        (status = 204, description = "All sessions revoked"),
        (status = 401, description = "Authentication required", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout_all(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let principal = super::principal::require_auth(&headers, &pool, &auth_state).await?;

    // Bumping the version epoch orphans every outstanding refresh token at
    // once; the ledger is emptied in the same statement.
    bump_token_version(&pool, principal.id)
        .await
        .map_err(ApiError::Internal)?;

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::NO_CONTENT, response_headers).into_response())
}

/// Mint an access/refresh pair for a verified credential check, record the
/// refresh token in the ledger, and build the response body plus cookie.
pub(super) async fn establish_session(
    pool: &PgPool,
    auth_state: &AuthState,
    headers: &HeaderMap,
    record: &PrincipalRecord,
) -> Result<(LoginResponse, Option<HeaderValue>), ApiError> {
    let now = chrono::Utc::now();
    let (access_token, _) = auth_state
        .keys()
        .issue_access(record.id, &record.email, record.role, now)
        .map_err(|err| ApiError::Internal(err.into()))?;
    let (refresh_token, _) = auth_state
        .keys()
        .issue_refresh(record.id, &record.email, record.role, record.token_version, now)
        .map_err(|err| ApiError::Internal(err.into()))?;

    let meta = TokenMeta {
        user_agent: extract_user_agent(headers),
        ip: extract_client_ip(headers),
    };
    record_refresh_token(
        pool,
        record.id,
        &refresh_token,
        auth_state.config().refresh_ttl_seconds(),
        meta,
    )
    .await
    .map_err(ApiError::Internal)?;

    let body = LoginResponse {
        access_token,
        expires_in: auth_state.config().access_ttl_seconds(),
        principal: principal_response(record),
    };
    let cookie = refresh_cookie(auth_state.config(), &refresh_token).ok();
    Ok((body, cookie))
}

/// Project a stored principal into its public shape.
pub(crate) fn principal_response(record: &PrincipalRecord) -> PrincipalResponse {
    PrincipalResponse {
        id: record.id,
        name: record.name.clone(),
        email: record.email.clone(),
        role: record.role,
        email_verified: record.email_verified_at.is_some(),
        created_at: record.created_at,
    }
}

/// The uniform 401 for every refresh failure, cookie cleared.
fn refresh_rejection(config: &AuthConfig) -> Response {
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::UNAUTHORIZED,
        response_headers,
        Json(ErrorBody {
            message: "Invalid refresh token".to_string(),
        }),
    )
        .into_response()
}

/// Build the `HttpOnly` cookie carrying the refresh token.
pub(super) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.refresh_ttl_seconds();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}=; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age=0"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_refresh_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == REFRESH_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
