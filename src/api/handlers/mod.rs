//! API handlers for Studia.
//!
//! Routes are grouped by audience: `auth` for the session lifecycle, `admin`
//! for role-gated management, `me` for the authenticated principal, and
//! `health` for liveness.

pub mod admin;
pub mod auth;
pub mod health;
pub mod me;
