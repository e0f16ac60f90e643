//! # Sesamo (Mobile OTP Authentication & Session Service)
//!
//! `sesamo` is the authentication core behind a mobile-first web application.
//! Clients authenticate with a mobile number and password, then prove control
//! of the number with a short-lived one-time code delivered over SMS. Verified
//! users receive an opaque session/refresh token pair and can optionally
//! enroll a TOTP authenticator with single-use recovery codes.
//!
//! ## Flows
//!
//! - **Signup:** create an unverified user, issue a `signup` OTP, dispatch it
//!   best-effort. The user stays unverified until the code is redeemed.
//! - **Signin:** verify the password, then issue a `signin` OTP; no tokens
//!   leave this endpoint. Redeeming the code at `/v1/auth/verify-otp` mints
//!   the session pair. OTP issuance is throttled per user and purpose (hourly
//!   cap plus a cooldown) to bound SMS cost and brute-force attempts.
//! - **OTP verification:** codes are redeemed with a single conditional
//!   update, so concurrent attempts with the same code cannot both win. The
//!   grant reports `twoFactorRequired` when the account expects the TOTP
//!   step-up at `/v1/auth/2fa/signin` before sensitive operations.
//! - **Password reset:** consumes a `password_reset` OTP, rehashes the
//!   password, and revokes every session for the user.
//! - **Two-factor:** TOTP enrollment is a generate/verify handshake; the
//!   secret only counts once a code has been proven. Enabling 2FA issues ten
//!   single-use recovery codes, returned exactly once. Every 2FA route rides
//!   on a live session token.
//!
//! ## Token handling
//!
//! Raw session, refresh, and recovery values never touch the database: the
//! store keeps SHA-256 digests for session/refresh tokens and Argon2id hashes
//! for passwords and recovery codes.

pub mod api;
pub mod cli;
pub mod totp;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
