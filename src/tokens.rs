//! Signed access/refresh token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with distinct secrets so a
//! leaked refresh secret cannot forge access tokens and vice versa. Every
//! token carries a fresh random `jti`, which keeps two tokens minted in the
//! same millisecond distinguishable. Refresh tokens additionally embed the
//! principal's `token_version`; bumping the version invalidates every
//! outstanding refresh token at once.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::roles::Role;

/// Access tokens live for 15 minutes.
pub const ACCESS_TTL_SECONDS: i64 = 15 * 60;

/// Refresh tokens live for 7 days.
pub const REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Revocation epoch; must match the principal's stored `token_version`.
    pub version: i64,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("failed to sign token")]
    Signing,
}

/// Immutable signing material, loaded once at startup and injected into the
/// issuer and the session validator.
#[derive(Clone)]
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenKeys {
    /// Build keys from the two configured secrets.
    ///
    /// # Errors
    ///
    /// Returns an error if either secret is empty; the caller treats this as
    /// a fatal startup error, never a per-request one.
    pub fn new(access_secret: &SecretString, refresh_secret: &SecretString) -> anyhow::Result<Self> {
        let access = access_secret.expose_secret();
        let refresh = refresh_secret.expose_secret();
        if access.is_empty() {
            anyhow::bail!("access token secret must not be empty");
        }
        if refresh.is_empty() {
            anyhow::bail!("refresh token secret must not be empty");
        }
        Ok(Self {
            access_encoding: EncodingKey::from_secret(access.as_bytes()),
            access_decoding: DecodingKey::from_secret(access.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh.as_bytes()),
        })
    }

    /// Mint a short-lived access token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue_access(
        &self,
        id: Uuid,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, AccessClaims), TokenError> {
        let claims = AccessClaims {
            sub: id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: now.timestamp() + ACCESS_TTL_SECONDS,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|_| TokenError::Signing)?;
        Ok((token, claims))
    }

    /// Mint a refresh token bound to the principal's current `token_version`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue_refresh(
        &self,
        id: Uuid,
        email: &str,
        role: Role,
        version: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, RefreshClaims), TokenError> {
        let claims = RefreshClaims {
            sub: id,
            email: email.to_string(),
            role,
            version,
            iat: now.timestamp(),
            exp: now.timestamp() + REFRESH_TTL_SECONDS,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|_| TokenError::Signing)?;
        Ok((token, claims))
    }

    /// Verify an access token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing why verification failed; callers
    /// map every variant to the same generic authentication failure.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    /// Verify a refresh token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing why verification failed.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}
