//! Password reset.
//!
//! The forgot endpoint is intentionally opaque: every well-formed request gets
//! the same 202, whether or not the account exists, whether or not the
//! throttle fired. The reset endpoint redeems the code and revokes every live
//! session for the account.

use axum::{Json, extract::Extension, http::StatusCode};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::api::notify::Notification;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{
    consume_otp, delete_user_sessions, lookup_user_by_identity, update_password_hash,
};
use super::types::{ForgotPasswordRequest, MessageResponse, OtpPurpose, ResetPasswordRequest};
use super::utils::{hash_password, normalize_identity};
use super::verify::issue_otp;

const FORGOT_MESSAGE: &str = "If the account exists, a reset code has been sent";

/// Request a password reset code. Always answers 202.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Accepted", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let accepted = (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: FORGOT_MESSAGE.to_string(),
        }),
    );

    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let identity = normalize_identity(&request.identity);
    let user = match lookup_user_by_identity(&pool, &identity).await {
        Ok(user) => user,
        Err(err) => {
            // Lookup failures stay opaque too; log and answer 202.
            warn!("forgot-password lookup failed: {err:#}");
            return Ok(accepted);
        }
    };

    if let Some(user) = user {
        if user.is_active {
            if let Err(err) = issue_otp(&pool, &auth_state, &user, OtpPurpose::PasswordReset).await
            {
                // Throttled or failed; the caller learns nothing either way.
                warn!("forgot-password code not issued: {err}");
            }
        }
    }

    Ok(accepted)
}

/// Redeem a reset code and set a new password.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let new_password = request.new_password.expose_secret();
    if new_password.len() < auth_state.config.password_min_len {
        return Err(AuthError::validation(format!(
            "Password must be at least {} characters",
            auth_state.config.password_min_len
        )));
    }

    let code = request.code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::validation("Invalid or expired code"));
    }

    let identity = normalize_identity(&request.identity);
    let user = lookup_user_by_identity(&pool, &identity).await?;
    let Some(user) = user else {
        // Unknown identity and wrong code look the same to the caller.
        return Err(AuthError::validation("Invalid or expired code"));
    };

    if !consume_otp(&pool, user.user_id, code, OtpPurpose::PasswordReset.as_str()).await? {
        return Err(AuthError::validation("Invalid or expired code"));
    }

    let password_hash = hash_password(new_password)?;
    update_password_hash(&pool, user.user_id, &password_hash).await?;
    // Anyone holding a stolen session loses it along with the old password.
    delete_user_sessions(&pool, user.user_id).await?;

    // Best-effort heads-up; the reset already succeeded.
    if let Some(email) = user.email.as_deref() {
        if let Err(err) = auth_state.mail.send(&Notification {
            destination: email.to_string(),
            body: "Your password was changed. If this was not you, contact support".to_string(),
        }) {
            warn!("failed to mail password-change notice to {email}: {err:#}");
        }
    }

    Ok(Json(MessageResponse {
        message: "Password updated. Sign in with your new password".to_string(),
    }))
}
