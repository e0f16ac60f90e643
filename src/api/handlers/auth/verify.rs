//! One-time code issuance and redemption.
//!
//! Issuance is throttled per user and purpose. Redemption is a single
//! conditional UPDATE, so a code can be spent exactly once no matter how many
//! verifies race for it.

use axum::{Json, extract::Extension, http::HeaderMap};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::api::notify::Notification;

use super::error::AuthError;
use super::mfa;
use super::rate_limit::{ThrottleDecision, decide};
use super::session::summarize;
use super::state::{AuthConfig, AuthState};
use super::storage::{
    UserRecord, consume_otp, ensure_default_role, insert_otp, insert_session, load_roles,
    lookup_user_by_identity, mark_user_verified, otp_issuance_stats, touch_last_login,
};
use super::types::{
    OtpPurpose, SendOtpRequest, SendOtpResponse, SessionCredentials, SessionGrantResponse,
    VerifyOtpRequest,
};
use super::utils::{extract_client_ip, generate_otp_code, normalize_identity, phone_label};

/// Enforce the per-user issuance throttle for one purpose.
pub(super) async fn check_otp_throttle(
    pool: &PgPool,
    config: &AuthConfig,
    user_id: Uuid,
    purpose: OtpPurpose,
) -> Result<(), AuthError> {
    let stats = otp_issuance_stats(pool, user_id, purpose.as_str()).await?;
    if let ThrottleDecision::Deny {
        retry_after_seconds,
    } = decide(config, stats)
    {
        return Err(AuthError::RateLimited(format!(
            "Too many codes requested. Try again in {retry_after_seconds} seconds"
        )));
    }
    Ok(())
}

/// Store and deliver a fresh code. Callers are expected to have passed
/// [`check_otp_throttle`] already.
pub(super) async fn dispatch_otp(
    pool: &PgPool,
    auth_state: &AuthState,
    user: &UserRecord,
    purpose: OtpPurpose,
) -> Result<bool, AuthError> {
    let code = generate_otp_code();
    let destination = phone_label(&user.country_code, &user.mobile_number);
    insert_otp(
        pool,
        user.user_id,
        &destination,
        &code,
        purpose.as_str(),
        auth_state.config.otp_ttl_seconds,
    )
    .await?;

    // Email copy is best-effort and never affects the reported outcome.
    if let Some(email) = user.email.as_deref() {
        if let Err(err) = auth_state.mail.send(&Notification {
            destination: email.to_string(),
            body: format!("Your verification code is {code}"),
        }) {
            warn!("failed to mail code copy to {email}: {err:#}");
        }
    }

    match auth_state.sms.send(&Notification {
        destination: destination.clone(),
        body: format!("Your verification code is {code}"),
    }) {
        Ok(()) => Ok(true),
        Err(err) => {
            // The code row exists; the user can ask for a resend.
            warn!("failed to send code to {destination}: {err:#}");
            Ok(false)
        }
    }
}

/// Issue a one-time code for an existing account, respecting the per-user
/// throttle.
pub(super) async fn issue_otp(
    pool: &PgPool,
    auth_state: &AuthState,
    user: &UserRecord,
    purpose: OtpPurpose,
) -> Result<bool, AuthError> {
    check_otp_throttle(pool, &auth_state.config, user.user_id, purpose).await?;
    dispatch_otp(pool, auth_state, user, purpose).await
}

/// Mint a session for a user whose factor just cleared and build the shared
/// grant response. `two_factor_required` is the caller's call: true after a
/// first factor when the account still expects the step-up, false once the
/// second factor has cleared.
pub(super) async fn grant_session(
    pool: &PgPool,
    auth_state: &AuthState,
    headers: &HeaderMap,
    user: &UserRecord,
    message: &str,
    two_factor_required: bool,
) -> Result<SessionGrantResponse, AuthError> {
    ensure_default_role(pool, user.user_id, super::signup::DEFAULT_ROLE).await?;
    let roles = load_roles(pool, user.user_id).await?;

    let client_ip = extract_client_ip(headers);
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let tokens = insert_session(
        pool,
        user.user_id,
        auth_state.config.session_ttl_seconds,
        client_ip.as_deref(),
        user_agent.as_deref(),
    )
    .await?;
    touch_last_login(pool, user.user_id).await?;

    Ok(SessionGrantResponse {
        message: message.to_string(),
        session: SessionCredentials {
            token: tokens.token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at_unix,
        },
        two_factor_required,
        user: summarize(user, roles),
    })
}

/// Send a fresh one-time code to a known mobile number.
#[utoipa::path(
    post,
    path = "/v1/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code issued", body = SendOtpResponse),
        (status = 404, description = "No account for this identity", body = super::error::ErrorBody),
        (status = 429, description = "Throttled", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn send_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SendOtpRequest>>,
) -> Result<Json<SendOtpResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    if request.purpose == OtpPurpose::PasswordReset {
        // Reset codes are only issued through the forgot-password flow, which
        // keeps its responses opaque.
        return Err(AuthError::validation(
            "Use the forgot-password endpoint for reset codes",
        ));
    }

    let identity = normalize_identity(&request.identity);
    let user = lookup_user_by_identity(&pool, &identity).await?;
    let Some(user) = user else {
        return Err(AuthError::NotFound("Account not found".to_string()));
    };
    if !user.is_active {
        return Err(AuthError::Forbidden("Account is disabled".to_string()));
    }
    if request.purpose == OtpPurpose::Signin && !user.is_verified {
        return Err(AuthError::Unverified);
    }

    let sms_sent = issue_otp(&pool, &auth_state, &user, request.purpose).await?;

    Ok(Json(SendOtpResponse {
        message: "Verification code sent".to_string(),
        sms_sent,
    }))
}

/// Redeem a one-time code and mint a session.
///
/// Signup codes additionally flip the account to verified. Reset codes are
/// redeemed by the reset endpoint instead.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted, session granted", body = SessionGrantResponse),
        (status = 400, description = "Invalid or expired code", body = super::error::ErrorBody),
        (status = 404, description = "No account for this identity", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Json<SessionGrantResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    if request.purpose == OtpPurpose::PasswordReset {
        return Err(AuthError::validation(
            "Reset codes are redeemed by the reset-password endpoint",
        ));
    }

    let code = request.code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::validation("Invalid or expired code"));
    }

    let identity = normalize_identity(&request.identity);
    let user = lookup_user_by_identity(&pool, &identity).await?;
    let Some(mut user) = user else {
        return Err(AuthError::NotFound("Account not found".to_string()));
    };
    if !user.is_active {
        return Err(AuthError::Forbidden("Account is disabled".to_string()));
    }

    if !consume_otp(&pool, user.user_id, code, request.purpose.as_str()).await? {
        return Err(AuthError::validation("Invalid or expired code"));
    }

    let message = match request.purpose {
        OtpPurpose::Signup => {
            mark_user_verified(&pool, user.user_id).await?;
            user.is_verified = true;
            "Account verified"
        }
        OtpPurpose::Signin => "Signed in",
        OtpPurpose::PasswordReset => unreachable!("rejected above"),
    };

    let two_factor_required = mfa::storage::two_factor_enabled(&pool, user.user_id).await?;
    let grant = grant_session(
        &pool,
        &auth_state,
        &headers,
        &user,
        message,
        two_factor_required,
    )
    .await?;
    Ok(Json(grant))
}

#[cfg(test)]
mod tests {
    use super::super::state::{AuthConfig, AuthState};
    use super::{send_otp, verify_otp};
    use crate::api::handlers::auth::error::AuthError;
    use crate::api::handlers::auth::types::{OtpPurpose, SendOtpRequest, VerifyOtpRequest};
    use anyhow::Result;
    use axum::Json;
    use axum::extract::Extension;
    use axum::http::HeaderMap;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(AuthConfig::new("Sesamo")))
    }

    #[tokio::test]
    async fn send_otp_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = send_otp(Extension(pool), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn send_otp_rejects_reset_purpose() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = send_otp(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(SendOtpRequest {
                identity: "+15551234567".to_string(),
                purpose: OtpPurpose::PasswordReset,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_malformed_code() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        for bad in ["", "12345", "1234567", "12345a"] {
            let result = verify_otp(
                HeaderMap::new(),
                Extension(pool.clone()),
                Extension(auth_state()),
                Some(Json(VerifyOtpRequest {
                    identity: "+15551234567".to_string(),
                    code: bad.to_string(),
                    purpose: OtpPurpose::Signup,
                })),
            )
            .await;
            assert!(matches!(result, Err(AuthError::Validation(_))));
        }
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_reset_purpose() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = verify_otp(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(VerifyOtpRequest {
                identity: "+15551234567".to_string(),
                code: "123456".to_string(),
                purpose: OtpPurpose::PasswordReset,
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }
}
