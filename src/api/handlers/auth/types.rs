//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::Role;

/// Signup body. Only email and password are required; a missing name is
/// derived from the email.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public projection of a principal, safe to return to callers.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PrincipalResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub principal: PrincipalResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// The reset token itself travels in the URL path.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateTeacherRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserListResponse {
    pub users: Vec<PrincipalResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            name: Some("Alice".to_string()),
            email: "alice@example.com".to_string(),
            password: "hunter2!".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.name.as_deref(), Some("Alice"));
        Ok(())
    }

    #[test]
    fn register_request_needs_only_email_and_password() -> Result<()> {
        let decoded: RegisterRequest =
            serde_json::from_value(serde_json::json!({
                "email": "a@b.com",
                "password": "secret1",
            }))?;
        assert_eq!(decoded.name, None);
        assert_eq!(decoded.email, "a@b.com");

        let decoded: CreateTeacherRequest =
            serde_json::from_value(serde_json::json!({
                "email": "t@b.com",
                "password": "secret1",
            }))?;
        assert_eq!(decoded.name, None);
        Ok(())
    }

    #[test]
    fn principal_response_serializes_role_lowercase() -> Result<()> {
        let response = PrincipalResponse {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Student,
            email_verified: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&response)?;
        let role = value
            .get("role")
            .and_then(serde_json::Value::as_str)
            .context("missing role")?;
        assert_eq!(role, "student");
        Ok(())
    }

    #[test]
    fn login_response_nests_principal() -> Result<()> {
        let response = LoginResponse {
            access_token: "jwt".to_string(),
            expires_in: 900,
            principal: PrincipalResponse {
                id: Uuid::new_v4(),
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                role: Role::Superadmin,
                email_verified: true,
                created_at: Utc::now(),
            },
        };
        let value = serde_json::to_value(&response)?;
        let nested = value
            .get("principal")
            .and_then(|p| p.get("email"))
            .and_then(serde_json::Value::as_str)
            .context("missing principal email")?;
        assert_eq!(nested, "bob@example.com");
        Ok(())
    }
}
