//! Database helpers for users, one-time codes and sessions.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::rate_limit::OtpIssuanceStats;
use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Outcome when attempting to create a new user row.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Account fields loaded for credential checks and response bodies.
#[derive(Debug, Clone)]
pub(super) struct UserRecord {
    pub(super) user_id: Uuid,
    pub(super) mobile_number: String,
    pub(super) country_code: String,
    pub(super) email: Option<String>,
    pub(super) password_hash: String,
    pub(super) full_name: String,
    pub(super) is_verified: bool,
    pub(super) is_active: bool,
}

/// Minimal data returned for a valid session token.
pub(super) struct SessionRecord {
    pub(super) user_id: Uuid,
    pub(super) expires_at_unix: i64,
}

/// Raw tokens handed back to the caller after a session insert.
/// Only their hashes are stored.
pub(super) struct SessionTokens {
    pub(super) token: String,
    pub(super) refresh_token: String,
    pub(super) expires_at_unix: i64,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        user_id: row.get("id"),
        mobile_number: row.get("mobile_number"),
        country_code: row.get("country_code"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        is_verified: row.get("is_verified"),
        is_active: row.get("is_active"),
    }
}

/// Look up a user by the exact (mobile, country) pair used at signup.
pub(super) async fn lookup_user_by_mobile(
    pool: &PgPool,
    mobile_number: &str,
    country_code: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, mobile_number, country_code, email, password_hash, full_name, is_verified, is_active FROM users WHERE mobile_number = $1 AND country_code = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(mobile_number)
        .bind(country_code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by mobile")?;
    Ok(row.map(|row| user_from_row(&row)))
}

/// Look up a user by a normalized `+<digits>` identity.
/// Matches the concatenation of dialing prefix and number, so "+15551234567"
/// finds the ("+1", "5551234567") row.
pub(super) async fn lookup_user_by_identity(
    pool: &PgPool,
    identity_normalized: &str,
) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, mobile_number, country_code, email, password_hash, full_name, is_verified, is_active
        FROM users
        WHERE country_code || mobile_number = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identity_normalized)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by identity")?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub(super) async fn lookup_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, mobile_number, country_code, email, password_hash, full_name, is_verified, is_active
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub(super) async fn load_roles(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
    let query = "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to load user roles")?;
    Ok(rows.iter().map(|row| row.get("role")).collect())
}

pub(super) async fn insert_user(
    pool: &PgPool,
    mobile_number: &str,
    country_code: &str,
    email: Option<&str>,
    password_hash: &str,
    full_name: &str,
) -> Result<SignupOutcome> {
    // The UNIQUE(mobile_number, country_code) constraint is the final arbiter
    // for duplicate signups; racing requests lose here, not at a pre-check.
    let query = r"
        INSERT INTO users
            (mobile_number, country_code, email, password_hash, full_name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(mobile_number)
        .bind(country_code)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(super) async fn ensure_default_role(pool: &PgPool, user_id: Uuid, role: &str) -> Result<()> {
    let query = r"
        INSERT INTO user_roles (user_id, role)
        VALUES ($1, $2)
        ON CONFLICT (user_id, role) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to ensure default role")?;
    Ok(())
}

/// Issuance history for the rate-limit decision: codes in the last rolling
/// hour and seconds since the most recent one.
pub(super) async fn otp_issuance_stats(
    pool: &PgPool,
    user_id: Uuid,
    purpose: &str,
) -> Result<OtpIssuanceStats> {
    let query = r"
        SELECT
            COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '1 hour') AS issued_last_hour,
            EXTRACT(EPOCH FROM (NOW() - MAX(created_at)))::bigint AS seconds_since_last
        FROM otp_codes
        WHERE user_id = $1 AND purpose = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to load OTP issuance stats")?;
    Ok(OtpIssuanceStats {
        issued_last_hour: row.get("issued_last_hour"),
        seconds_since_last: row.get("seconds_since_last"),
    })
}

pub(super) async fn insert_otp(
    pool: &PgPool,
    user_id: Uuid,
    destination: &str,
    code: &str,
    purpose: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO otp_codes (user_id, destination, code, purpose, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(destination)
        .bind(code)
        .bind(purpose)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert OTP code")?;
    Ok(())
}

/// Mark the newest matching unused, unexpired code as used.
/// A single conditional UPDATE makes consumption atomic: two racing verifies
/// for the same code see exactly one row returned between them.
pub(super) async fn consume_otp(
    pool: &PgPool,
    user_id: Uuid,
    code: &str,
    purpose: &str,
) -> Result<bool> {
    let query = r"
        UPDATE otp_codes
        SET used_at = NOW()
        WHERE id = (
            SELECT id FROM otp_codes
            WHERE user_id = $1
              AND code = $2
              AND purpose = $3
              AND used_at IS NULL
              AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
        )
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(code)
        .bind(purpose)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume OTP code")?;
    Ok(row.is_some())
}

pub(super) async fn mark_user_verified(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET is_verified = TRUE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;
    Ok(())
}

pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
    client_ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<SessionTokens> {
    // Generate random tokens, store only their hashes, and return the raw
    // values so the caller can hand them to the client.
    let query = r"
        INSERT INTO user_sessions
            (user_id, session_hash, refresh_hash, client_ip, user_agent, expires_at)
        VALUES ($1, $2, $3, $4, $5, NOW() + ($6 * INTERVAL '1 second'))
        RETURNING EXTRACT(EPOCH FROM expires_at)::bigint AS expires_at_unix
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let refresh_token = generate_session_token()?;
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(hash_session_token(&token))
            .bind(hash_session_token(&refresh_token))
            .bind(client_ip)
            .bind(user_agent)
            .bind(ttl_seconds)
            .fetch_one(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(row) => {
                return Ok(SessionTokens {
                    token,
                    refresh_token,
                    expires_at_unix: row.get("expires_at_unix"),
                });
            }
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Only accept active users and unexpired sessions.
    let query = r"
        SELECT users.id,
               EXTRACT(EPOCH FROM user_sessions.expires_at)::bigint AS expires_at_unix
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
          AND users.is_active
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        expires_at_unix: row.get("expires_at_unix"),
    }))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Revoke every session a user holds, e.g. after a password reset.
pub(super) async fn delete_user_sessions(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user sessions")?;
    Ok(())
}

pub(super) async fn touch_last_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET last_login_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update last login")?;
    Ok(())
}

pub(super) async fn update_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(())
}
