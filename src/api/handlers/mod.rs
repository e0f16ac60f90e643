//! API handlers for Sesamo.
//!
//! Route handlers live here; everything auth-specific is under `auth`.

pub mod auth;
pub mod health;
pub mod root;
