//! Auth handlers and supporting modules.
//!
//! This module coordinates mobile-number authentication: password signup and
//! signin, SMS one-time codes, password reset, bearer sessions, and TOTP
//! two-factor with recovery codes.
//!
//! ## Token discipline
//!
//! Raw session and refresh tokens exist only in responses; the database holds
//! SHA-256 hashes. Passwords and recovery codes are salted Argon2id hashes.
//! One-time codes are single-use, enforced by a conditional UPDATE rather
//! than a read-then-write.
//!
//! ## Code throttling
//!
//! Issuance is limited per user and purpose: at most five codes per rolling
//! hour with a sixty-second cooldown between codes (both tunable).

pub(crate) mod error;
pub(crate) mod mfa;
mod rate_limit;
pub(crate) mod reset;
pub(crate) mod session;
pub(crate) mod signin;
pub(crate) mod signup;
mod state;
mod storage;
pub(crate) mod types;
mod utils;
pub(crate) mod verify;

pub use state::{AuthConfig, AuthState};
