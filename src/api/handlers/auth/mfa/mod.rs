//! Two-factor authentication on top of OTP sign-in.
//!
//! - TOTP (RFC 6238) as the second factor, provisioned via `otpauth://` URI.
//! - Ten single-use recovery codes, issued at verify time, hashes only in
//!   the database.
//! - Disable purges the secret and any remaining recovery codes.
//!
//! Every route here is session-bound: the session token rides in the body's
//! `sessionToken` field or the Authorization header. The signin route is the
//! step-up that clears `twoFactorRequired` on a freshly granted session.

pub(super) mod recovery;
pub(super) mod storage;

use axum::{Json, extract::Extension, http::HeaderMap};
use sqlx::PgPool;
use std::sync::Arc;

use crate::totp;

use super::error::AuthError;
use super::session::{load_user, resolve_session};
use super::state::AuthState;
use super::storage::UserRecord;
use super::types::{
    SessionGrantResponse, TwoFactorDisableRequest, TwoFactorDisableResponse,
    TwoFactorGenerateRequest, TwoFactorGenerateResponse, TwoFactorSigninRequest,
    TwoFactorVerifyRequest, TwoFactorVerifyResponse,
};
use super::utils::phone_label;
use super::verify::grant_session;

use recovery::{RecoveryCodeBatch, matches_recovery_code, normalize_recovery_code};

/// The label shown in the authenticator app.
fn account_label(user: &UserRecord) -> String {
    user.email
        .clone()
        .unwrap_or_else(|| phone_label(&user.country_code, &user.mobile_number))
}

/// Start or restart two-factor enrollment: mint a secret and hand back the
/// provisioning URI. Re-running replaces any earlier secret and switches
/// enforcement off until the new secret is confirmed.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/generate",
    request_body = TwoFactorGenerateRequest,
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Pending secret issued", body = TwoFactorGenerateResponse),
        (status = 401, description = "Missing or invalid session", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn generate(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorGenerateRequest>>,
) -> Result<Json<TwoFactorGenerateResponse>, AuthError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let session = resolve_session(&pool, &headers, request.session_token.as_deref()).await?;
    let user = load_user(&pool, &session).await?;

    let secret = totp::generate_secret();
    storage::upsert_pending_secret(&pool, user.user_id, &secret).await?;

    let totp = totp::build(&secret, &auth_state.config.totp_issuer, &account_label(&user))?;

    Ok(Json(TwoFactorGenerateResponse {
        otpauth_url: totp.get_url(),
        secret,
    }))
}

/// Confirm the first authenticator code, switch enforcement on, and issue the
/// recovery batch. The plaintext codes appear in this response only.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/verify",
    request_body = TwoFactorVerifyRequest,
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Two-factor enabled", body = TwoFactorVerifyResponse),
        (status = 400, description = "No pending secret", body = super::error::ErrorBody),
        (status = 401, description = "Invalid code or session", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorVerifyRequest>>,
) -> Result<Json<TwoFactorVerifyResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };
    let session = resolve_session(&pool, &headers, request.session_token.as_deref()).await?;
    let user = load_user(&pool, &session).await?;

    let Some(record) = storage::load_two_factor(&pool, user.user_id).await? else {
        return Err(AuthError::validation("Generate a two-factor secret first"));
    };

    let totp = totp::build(
        &record.totp_secret,
        &auth_state.config.totp_issuer,
        &account_label(&user),
    )?;
    if !totp::check_now(&totp, request.code.trim()) {
        return Err(AuthError::unauthorized("Invalid authenticator code"));
    }

    // Stamps last_verified_at as part of the flip.
    storage::enable_two_factor(&pool, user.user_id).await?;

    // Re-verifying replaces the batch; earlier codes stop working.
    let batch = RecoveryCodeBatch::generate()?;
    storage::replace_recovery_codes(&pool, user.user_id, &batch.code_hashes).await?;

    Ok(Json(TwoFactorVerifyResponse {
        message: "Two-factor enabled. Store these recovery codes somewhere safe".to_string(),
        recovery_codes: batch.codes,
    }))
}

/// Clear the second factor on an account that has two-factor enabled. Accepts
/// an authenticator code, or a recovery code when `isRecoveryCode` is set, and
/// mints a fresh session with `twoFactorRequired` already false.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/signin",
    request_body = TwoFactorSigninRequest,
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Second factor cleared, session granted", body = SessionGrantResponse),
        (status = 400, description = "Two-factor not enabled", body = super::error::ErrorBody),
        (status = 401, description = "Invalid code or session", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn signin(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorSigninRequest>>,
) -> Result<Json<SessionGrantResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };
    let session = resolve_session(&pool, &headers, request.session_token.as_deref()).await?;
    let user = load_user(&pool, &session).await?;

    let Some(record) = storage::load_two_factor(&pool, user.user_id).await? else {
        return Err(AuthError::validation("Two-factor is not enabled"));
    };
    if !record.enabled {
        return Err(AuthError::validation("Two-factor is not enabled"));
    }

    let cleared = check_second_factor(
        &pool,
        &auth_state,
        &user,
        &record,
        request.token.trim(),
        request.is_recovery_code,
    )
    .await?;
    if !cleared {
        return Err(AuthError::unauthorized("Invalid code"));
    }

    let grant = grant_session(&pool, &auth_state, &headers, &user, "Signed in", false).await?;
    Ok(Json(grant))
}

/// Turn two-factor off and purge the secret and remaining recovery codes.
/// The session itself is proof of possession; no code is required.
#[utoipa::path(
    post,
    path = "/v1/auth/2fa/disable",
    request_body = TwoFactorDisableRequest,
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Two-factor disabled", body = TwoFactorDisableResponse),
        (status = 401, description = "Missing or invalid session", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn disable(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<TwoFactorDisableRequest>>,
) -> Result<Json<TwoFactorDisableResponse>, AuthError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let session = resolve_session(&pool, &headers, request.session_token.as_deref()).await?;
    let user = load_user(&pool, &session).await?;

    storage::purge_two_factor(&pool, user.user_id).await?;

    Ok(Json(TwoFactorDisableResponse {
        success: true,
        message: "Two-factor disabled".to_string(),
    }))
}

/// Check the presented factor. A matched recovery code is consumed; a replay
/// of it fails.
async fn check_second_factor(
    pool: &PgPool,
    auth_state: &AuthState,
    user: &UserRecord,
    record: &storage::TwoFactorRecord,
    token: &str,
    is_recovery_code: bool,
) -> Result<bool, AuthError> {
    if !is_recovery_code {
        let totp = totp::build(
            &record.totp_secret,
            &auth_state.config.totp_issuer,
            &account_label(user),
        )?;
        if totp::check_now(&totp, token) {
            storage::touch_last_verified(pool, user.user_id).await?;
            return Ok(true);
        }
        return Ok(false);
    }

    let Ok(normalized) = normalize_recovery_code(token) else {
        return Ok(false);
    };
    for row in storage::list_recovery_codes(pool, user.user_id).await? {
        if matches_recovery_code(&normalized, &row.code_hash) {
            // Conditional consumption: a racing replay loses here.
            if storage::consume_recovery_code(pool, row.id).await? {
                storage::touch_last_verified(pool, user.user_id).await?;
                return Ok(true);
            }
            return Ok(false);
        }
    }
    Ok(false)
}
