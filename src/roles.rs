//! Principal roles and kind classification.
//!
//! Users and admins share one token namespace; the role claim alone decides
//! which kind of principal a token belongs to. User roles are immutable after
//! creation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Roles a user-kind principal can hold.
pub const USER_ROLES: [Role; 2] = [Role::Student, Role::Teacher];

/// Roles an admin-kind principal can hold.
pub const ADMIN_ROLES: [Role; 3] = [Role::Superadmin, Role::Contentmanager, Role::Moderator];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Superadmin,
    Contentmanager,
    Moderator,
}

/// Which side of the auth boundary a principal sits on. A request is never
/// both at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn kind(self) -> PrincipalKind {
        match self {
            Self::Student | Self::Teacher => PrincipalKind::User,
            Self::Superadmin | Self::Contentmanager | Self::Moderator => PrincipalKind::Admin,
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        self.kind() == PrincipalKind::Admin
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Superadmin => "superadmin",
            Self::Contentmanager => "contentmanager",
            Self::Moderator => "moderator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "superadmin" => Ok(Self::Superadmin),
            "contentmanager" => Ok(Self::Contentmanager),
            "moderator" => Ok(Self::Moderator),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
