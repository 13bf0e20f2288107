//! Shared state for the auth handlers: signing keys plus the knobs that
//! control token lifetimes and outgoing email links.

use crate::tokens::{ACCESS_TTL_SECONDS, REFRESH_TTL_SECONDS, TokenKeys};

const RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const EMAIL_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const RESEND_COOLDOWN_SECONDS: i64 = 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    email_token_ttl_seconds: i64,
    resend_cooldown_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: REFRESH_TTL_SECONDS,
            reset_ttl_seconds: RESET_TOKEN_TTL_SECONDS,
            email_token_ttl_seconds: EMAIL_TOKEN_TTL_SECONDS,
            resend_cooldown_seconds: RESEND_COOLDOWN_SECONDS,
        }
    }

    #[must_use]
    pub const fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_email_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub const fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub const fn reset_ttl_seconds(&self) -> i64 {
        self.reset_ttl_seconds
    }

    #[must_use]
    pub const fn email_token_ttl_seconds(&self) -> i64 {
        self.email_token_ttl_seconds
    }

    #[must_use]
    pub const fn resend_cooldown_seconds(&self) -> i64 {
        self.resend_cooldown_seconds
    }

    /// The refresh cookie is only marked `Secure` when the site itself is
    /// served over TLS, so local development against plain HTTP still works.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Bundle passed to handlers through request extensions.
#[derive(Clone)]
pub struct AuthState {
    config: AuthConfig,
    keys: TokenKeys,
}

impl AuthState {
    #[must_use]
    pub const fn new(config: AuthConfig, keys: TokenKeys) -> Self {
        Self { config, keys }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn keys(&self) -> &TokenKeys {
        &self.keys
    }
}
