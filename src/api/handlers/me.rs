//! Authenticated self-service endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::error::{ApiError, ErrorBody};

use super::auth::AuthState;
use super::auth::principal::require_auth;
use super::auth::session::principal_response;
use super::auth::types::PrincipalResponse;

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "The authenticated principal's public fields", body = PrincipalResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, ApiError> {
    let record = require_auth(&headers, &pool, &auth_state).await?;
    Ok((StatusCode::OK, Json(principal_response(&record))).into_response())
}
