//! # Studia (Learning Platform Backend)
//!
//! `studia` is the authentication and session core of the Studia learning
//! platform. It issues, stores, rotates and revokes access/refresh token
//! pairs for two principal kinds sharing one token namespace: users
//! (students, teachers) and admins (superadmin, contentmanager, moderator).
//!
//! ## Principals
//!
//! A single `principals` table holds both kinds; the role decides which side
//! of the boundary a record sits on, and email is unique across both. Forum
//! and progress content live in separate tables that only the admin
//! cascade-deletion path touches.
//!
//! ## Tokens
//!
//! - **Access tokens** are 15-minute HS256 JWTs presented as bearer tokens.
//! - **Refresh tokens** are 7-day HS256 JWTs signed with a distinct secret,
//!   carried in an `HttpOnly` cookie scoped to the auth routes, and tracked
//!   server-side in a bounded per-principal ledger (max 5 live entries, LRU
//!   eviction) for rotation and revocation.
//! - `token_version` is a revocation epoch: bumping it invalidates every
//!   outstanding refresh token for that principal.

pub mod api;
pub mod cli;
pub mod ledger;
pub mod password;
pub mod roles;
pub mod tokens;
