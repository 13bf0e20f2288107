//! Auth handlers and supporting modules.
//!
//! One set of endpoints serves both user and admin accounts: the `role`
//! stored on the principal row decides which kind a login produces, and the
//! role claim inside the access token decides what a request may do. Access
//! tokens are short-lived bearer JWTs; refresh tokens are longer-lived JWTs
//! carried in an `HttpOnly` cookie and tracked in a bounded per-principal
//! ledger so they can be rotated, revoked one at a time, or revoked all at
//! once.

pub(crate) mod login;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod reset;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

pub use state::{AuthConfig, AuthState};

pub(crate) use storage::{
    PrincipalRecord, SignupOutcome, delete_user_cascade, insert_provisioned_principal,
    list_user_principals, lookup_principal_by_email, lookup_principal_by_id,
};
pub(crate) use utils::{display_name, normalize_email, valid_email};
