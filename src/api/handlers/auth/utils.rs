//! Small helpers for auth validation, token handling and password hashing.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use base64::Engine;
use rand::{Rng, RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalize a mobile number for lookup/uniqueness checks.
/// Keeps digits only, so "555 123-4567" and "5551234567" are the same user.
pub(super) fn normalize_mobile(mobile: &str) -> String {
    mobile.chars().filter(char::is_ascii_digit).collect()
}

/// Basic mobile number check on already-normalized input: 10 to 15 digits
/// (national number up to the E.164 maximum).
pub(super) fn valid_mobile(mobile_normalized: &str) -> bool {
    Regex::new(r"^[0-9]{10,15}$").is_ok_and(|regex| regex.is_match(mobile_normalized))
}

/// Normalize a dialing prefix to a leading `+` followed by digits.
pub(super) fn normalize_country_code(country_code: &str) -> String {
    let digits: String = country_code.chars().filter(char::is_ascii_digit).collect();
    format!("+{digits}")
}

/// Dialing prefix check on already-normalized input (`+` plus 1-3 digits).
pub(super) fn valid_country_code(country_code_normalized: &str) -> bool {
    Regex::new(r"^\+[0-9]{1,3}$").is_ok_and(|regex| regex.is_match(country_code_normalized))
}

/// Collapse any phone spelling into `+<digits>` for identity matching.
/// Accepts "+1 (555) 123-4567", "15551234567" and friends.
pub(super) fn normalize_identity(identity: &str) -> String {
    let digits: String = identity.chars().filter(char::is_ascii_digit).collect();
    format!("+{digits}")
}

/// Full international number for display and notification delivery.
pub(super) fn phone_label(country_code: &str, mobile: &str) -> String {
    format!("{country_code}{mobile}")
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Create a six-digit one-time code. Never starts with zero so the string
/// and numeric forms agree.
pub(super) fn generate_otp_code() -> String {
    OsRng.gen_range(100_000..=999_999).to_string()
}

/// Create a new session or refresh token.
/// The raw value is only returned to the caller; the database stores a hash.
pub(super) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
/// The hash is used for lookups when the token is presented.
pub(super) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a password (or recovery code) with Argon2id and a fresh random salt.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a password against a stored Argon2id hash.
/// A malformed stored hash verifies as false rather than erroring, so a
/// corrupted row cannot distinguish itself from a wrong password.
pub(super) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Well-formed Argon2id hash that matches no password. Default parameters,
/// so verifying against it costs the same as a real credential check.
const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2VzYW1vZHVtbXlzYWx0$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Burn the Argon2 work of a credential check without a stored hash, so a
/// request for an unknown account takes as long as one for a known account.
pub(super) fn burn_password_check(password: &str) {
    let _ = verify_password(password, DUMMY_PASSWORD_HASH);
}

/// Pull a bearer token out of the Authorization header.
pub(super) fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP for session bookkeeping from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
