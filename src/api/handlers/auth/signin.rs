//! Password sign-in.
//!
//! Missing accounts and wrong passwords are indistinguishable to the caller;
//! both produce the same 401. A correct password never returns tokens here:
//! it issues a `signin` code, and `/v1/auth/verify-otp` mints the session.
//! The throttle is checked before the password hash is verified so a flooded
//! account does not burn Argon2 work.

use axum::{Json, extract::Extension};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::lookup_user_by_mobile;
use super::types::{OtpPurpose, SigninRequest, SigninResponse};
use super::utils::{burn_password_check, normalize_country_code, normalize_mobile, verify_password};
use super::verify::{check_otp_throttle, dispatch_otp};

/// Sign in with mobile number and password. On success a one-time code is
/// sent; the session is granted when the code is redeemed.
#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Code sent; complete sign-in with verify-otp", body = SigninResponse),
        (status = 401, description = "Invalid credentials", body = super::error::ErrorBody),
        (status = 403, description = "Account unverified or disabled", body = super::error::ErrorBody),
        (status = 429, description = "Too many codes requested", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn signin(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SigninRequest>>,
) -> Result<Json<SigninResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let mobile = normalize_mobile(&request.mobile_number);
    let country_code = request.country_code.as_deref().map_or_else(
        || super::signup::DEFAULT_COUNTRY_CODE.to_string(),
        normalize_country_code,
    );

    let user = lookup_user_by_mobile(&pool, &mobile, &country_code).await?;
    let Some(user) = user else {
        // Same Argon2 cost as a real account; unknown numbers cannot be
        // told apart by response time.
        burn_password_check(request.password.expose_secret());
        return Err(AuthError::unauthorized("Invalid mobile number or password"));
    };

    check_otp_throttle(&pool, &auth_state.config, user.user_id, OtpPurpose::Signin).await?;

    if !verify_password(request.password.expose_secret(), &user.password_hash) {
        return Err(AuthError::unauthorized("Invalid mobile number or password"));
    }
    if !user.is_active {
        return Err(AuthError::Forbidden("Account is disabled".to_string()));
    }
    if !user.is_verified {
        // No code is issued; the client re-runs signup verification through
        // send-otp first.
        return Err(AuthError::Unverified);
    }

    let sms_sent = dispatch_otp(&pool, &auth_state, &user, OtpPurpose::Signin).await?;

    Ok(Json(SigninResponse {
        message: "Verification code sent. Complete sign-in with the code.".to_string(),
        mobile_number: user.mobile_number,
        country_code: user.country_code,
        requires_otp: true,
        sms_sent,
    }))
}
